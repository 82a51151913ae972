//! Contract families: event decoding, enrichment, and storage recovery.

pub mod aave;
pub mod compound;
pub mod erc20;
pub mod erc721;
pub mod moloch;

use std::future::Future;

use chainevents_core::{sort_by_block, CanonicalEvent, DisconnectedRange, EntityKind, Error, Result};

pub use aave::{AaveProtocol, AaveStorageFetcher};
pub use compound::{CompoundProtocol, CompoundStorageFetcher};
pub use erc20::Erc20Protocol;
pub use erc721::Erc721Protocol;
pub use moloch::{MolochProtocol, MolochStorageFetcher};

/// Events reconstructed for one proposal.
#[derive(Debug)]
pub(crate) struct ProposalHistory {
    /// Block the proposal is placed at for range checks.
    pub start_block: u64,
    pub events: Vec<CanonicalEvent>,
    /// Canceled, executed, processed, or otherwise final.
    pub completed: bool,
}

/// Walk proposal ids newest first, collecting the events of those inside `range`.
///
/// Stops at the first proposal that starts before the range, after
/// `max_results` proposals, and (unless `fetch_all_completed`) at the first
/// completed proposal. `load` returns `None` for ids to skip.
pub(crate) async fn walk_newest_first<I, F, Fut>(
    ids: I,
    range: Option<&DisconnectedRange>,
    head: u64,
    fetch_all_completed: bool,
    mut load: F,
) -> Result<Vec<CanonicalEvent>>
where
    I: IntoIterator<Item = u64>,
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Option<ProposalHistory>>>,
{
    let range = range.copied().unwrap_or(DisconnectedRange::from_block(0));
    let (start, end) = (range.start_block, range.end_or(head));
    if start > end {
        tracing::error!(start, end, "Invalid fetch range");
        return Ok(Vec::new());
    }
    tracing::info!(start, end, "Fetching proposals from storage");

    let mut out = Vec::new();
    let mut fetched = 0usize;
    for id in ids {
        let Some(history) = load(id).await? else {
            continue;
        };
        if history.start_block < start {
            tracing::debug!(id, start_block = history.start_block, "Proposal predates range, ending fetch");
            break;
        }
        if history.start_block > end {
            continue;
        }
        out.extend(history.events);
        fetched += 1;

        if history.completed && !fetch_all_completed {
            tracing::debug!(id, "Proposal is completed, halting fetch");
            break;
        }
        if range.max_results.is_some_and(|max| fetched >= max) {
            tracing::debug!(fetched, "Reached max results, halting fetch");
            break;
        }
    }
    sort_by_block(&mut out);
    tracing::info!(proposals = fetched, events = out.len(), "Fetch complete");
    Ok(out)
}

/// Reject `fetch_one` requests for another network's entities.
pub(crate) fn expect_entity(entity: EntityKind, expected: EntityKind) -> Result<()> {
    if entity == expected {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} storage cannot fetch {} entities",
            expected.network(),
            entity.as_str()
        )))
    }
}

/// Parse a numeric entity id.
pub(crate) fn parse_index(id: &str) -> Result<u64> {
    id.parse()
        .map_err(|e| Error::Config(format!("invalid proposal id '{id}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainevents_core::payload::CompoundEvent;

    fn history(id: u64, start_block: u64, completed: bool) -> ProposalHistory {
        ProposalHistory {
            start_block,
            events: vec![CanonicalEvent::new(
                "compound",
                start_block,
                CompoundEvent::ProposalCanceled { id: id.to_string() },
            )],
            completed,
        }
    }

    async fn walk(
        proposals: &[(u64, u64, bool)],
        range: Option<DisconnectedRange>,
        all: bool,
    ) -> Vec<u64> {
        let events = walk_newest_first(
            proposals.iter().map(|p| p.0).rev(),
            range.as_ref(),
            1_000,
            all,
            |id| async move {
                Ok(proposals
                    .iter()
                    .find(|p| p.0 == id)
                    .map(|p| history(p.0, p.1, p.2)))
            },
        )
        .await
        .unwrap();
        events.iter().map(|e| e.block_number).collect()
    }

    #[tokio::test]
    async fn stops_at_first_completed_unless_asked() {
        let proposals = [(1, 100, true), (2, 200, true), (3, 300, false)];
        assert_eq!(walk(&proposals, None, false).await, [200, 300]);
        assert_eq!(walk(&proposals, None, true).await, [100, 200, 300]);
    }

    #[tokio::test]
    async fn stops_before_range_start_and_skips_after_end() {
        let proposals = [(1, 100, false), (2, 200, false), (3, 300, false), (4, 400, false)];
        let range = DisconnectedRange::between(150, 350);
        assert_eq!(walk(&proposals, Some(range), true).await, [200, 300]);
    }

    #[tokio::test]
    async fn honours_max_results() {
        let proposals = [(1, 100, false), (2, 200, false), (3, 300, false)];
        let range = DisconnectedRange::from_block(0).max_results(2);
        assert_eq!(walk(&proposals, Some(range), true).await, [200, 300]);
    }

    #[test]
    fn entity_and_index_checks() {
        assert!(expect_entity(EntityKind::AaveProposal, EntityKind::AaveProposal).is_ok());
        assert!(matches!(
            expect_entity(EntityKind::TipProposal, EntityKind::MolochProposal),
            Err(Error::Config(_))
        ));
        assert_eq!(parse_index("12").unwrap(), 12);
        assert!(parse_index("-1").is_err());
    }
}
