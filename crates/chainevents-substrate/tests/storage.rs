//! Storage migration: synthesizing events for entities that are still open.

mod common;

use chainevents_core::payload::{EventPayload, SubstrateEvent};
use chainevents_core::{DisconnectedRange, EntityKind, Error, StorageFetcher};
use chainevents_substrate::{
    DispatchEntry, OpenTip, PublicProposal, ReferendumStatus, Registration,
    SubstrateStorageFetcher, TreasuryProposalInfo,
};
use common::{init_tracing, preimage, MockApi};

fn kinds(events: &[chainevents_core::CanonicalEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

fn open_tip(closes: Option<u64>, votes: usize) -> OpenTip {
    OpenTip {
        reason: "0x74697021".into(),
        who: "beneficiary".into(),
        finder: "finder".into(),
        deposit: "5".into(),
        closes,
        tips: (0..votes).map(|i| (format!("tipper-{i}"), "100".into())).collect(),
        finders_fee: false,
    }
}

#[tokio::test]
async fn active_referendum_yields_one_started_event() {
    init_tracing();
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.referenda.push(ReferendumStatus {
            index: 0,
            proposal_hash: "0xref".into(),
            threshold: "Supermajorityapproval".into(),
            end: 1_200,
        })
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher.fetch(None, false).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].block_number, 1_000);
    assert_eq!(
        events[0].data,
        EventPayload::Substrate(SubstrateEvent::DemocracyStarted {
            referendum_index: 0,
            proposal_hash: "0xref".into(),
            vote_threshold: "Supermajorityapproval".into(),
            end_block: 1_200,
        })
    );
}

#[tokio::test]
async fn dispatch_queue_entry_is_started_then_passed() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.dispatch_queue.push(DispatchEntry {
            index: 4,
            at: 1_050,
            proposal_hash: "0xq".into(),
        })
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher.fetch(None, false).await.unwrap();
    assert_eq!(kinds(&events), ["democracy-started", "democracy-passed"]);
    assert_eq!(
        events[1].data,
        EventPayload::Substrate(SubstrateEvent::DemocracyPassed {
            referendum_index: 4,
            dispatch_block: Some(1_050),
        })
    );
}

#[tokio::test]
async fn preimages_follow_proposals_and_referenda() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.public_props.push(PublicProposal {
            index: 1,
            hash: "0xprop".into(),
            proposer: "alice".into(),
        });
        s.deposits.insert(1, "10".into());
        s.referenda.push(ReferendumStatus {
            index: 2,
            proposal_hash: "0xref".into(),
            threshold: "Simplemajority".into(),
            end: 2_000,
        });
        s.preimages.insert("0xprop".into(), preimage(400, "alice"));
        s.preimages.insert("0xref".into(), preimage(300, "bob"));
        s.preimages.insert("0xunrelated".into(), preimage(100, "carol"));
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher.fetch(None, false).await.unwrap();
    // Sorted by block: preimages carry the block they were noted at.
    assert_eq!(
        kinds(&events),
        ["preimage-noted", "preimage-noted", "democracy-proposed", "democracy-started"]
    );
    assert_eq!(events[0].block_number, 300);
    assert_eq!(events[1].block_number, 400);
    assert!(events.windows(2).all(|w| w[0].block_number <= w[1].block_number));
}

#[tokio::test]
async fn treasury_skips_approved_proposals() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        for i in 0..3 {
            s.treasury.insert(
                i,
                TreasuryProposalInfo {
                    proposer: format!("p{i}"),
                    value: "100".into(),
                    beneficiary: "b".into(),
                    bond: "5".into(),
                },
            );
        }
        s.treasury_count = 3;
        s.approvals = vec![1];
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher.fetch(None, false).await.unwrap();
    let ids: Vec<_> = events.iter().map(|e| e.entity().unwrap().id).collect();
    assert_eq!(ids, ["0", "2"]);
}

#[tokio::test]
async fn tips_expand_into_votes_and_closing() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.tips.insert("0xa".into(), open_tip(Some(1_100), 2));
        s.tips.insert("0xb".into(), open_tip(None, 0));
        s.broken_tips.insert("0xc".into());
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher.fetch(None, false).await.unwrap();
    assert_eq!(
        kinds(&events),
        ["new-tip", "tip-voted", "tip-voted", "tip-closing", "new-tip"]
    );
    match &events[0].data {
        EventPayload::Substrate(SubstrateEvent::NewTip { reason, .. }) => assert_eq!(reason, "tip!"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn missing_pallets_yield_nothing() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.modules.clear();
        s.referenda.push(ReferendumStatus {
            index: 0,
            proposal_hash: "0xref".into(),
            threshold: "Simplemajority".into(),
            end: 1_200,
        });
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());
    assert!(fetcher.fetch(None, false).await.unwrap().is_empty());
    assert!(fetcher.fetch_identities(&["x".into()]).await.unwrap().is_empty());
}

#[tokio::test]
async fn range_filters_by_block() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.public_props.push(PublicProposal {
            index: 1,
            hash: "0xprop".into(),
            proposer: "alice".into(),
        });
        s.deposits.insert(1, "10".into());
        s.preimages.insert("0xprop".into(), preimage(400, "alice"));
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher
        .fetch(Some(&DisconnectedRange::between(0, 500)), false)
        .await
        .unwrap();
    assert_eq!(kinds(&events), ["preimage-noted"]);
}

#[tokio::test]
async fn fetch_one_targets_a_single_entity() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.referenda.push(ReferendumStatus {
            index: 5,
            proposal_hash: "0x5".into(),
            threshold: "Simplemajority".into(),
            end: 1_100,
        });
        s.referenda.push(ReferendumStatus {
            index: 6,
            proposal_hash: "0x6".into(),
            threshold: "Simplemajority".into(),
            end: 1_100,
        });
        s.tips.insert("0xa".into(), open_tip(None, 1));
        s.tips.insert("0xb".into(), open_tip(None, 0));
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let referendum = fetcher.fetch_one("6", EntityKind::DemocracyReferendum).await.unwrap();
    assert_eq!(referendum.len(), 1);
    assert_eq!(referendum[0].entity().unwrap().id, "6");

    let tip = fetcher.fetch_one("0xa", EntityKind::TipProposal).await.unwrap();
    assert_eq!(kinds(&tip), ["new-tip", "tip-voted"]);

    assert!(fetcher
        .fetch_one("9", EntityKind::TreasuryProposal)
        .await
        .unwrap()
        .is_empty());

    let err = fetcher.fetch_one("1", EntityKind::CompoundProposal).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    let err = fetcher.fetch_one("abc", EntityKind::DemocracyProposal).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn identities_skip_unset_display_names() {
    let api = MockApi::new(1_000);
    api.with(|s| {
        s.registrars = vec![Some("reg".into())];
        s.identities.insert(
            "alice".into(),
            Registration {
                display: Some("Alice".into()),
                judgements: vec![(0, "Reasonable".into()), (3, "KnownGood".into())],
            },
        );
        s.identities.insert(
            "bob".into(),
            Registration {
                display: None,
                judgements: vec![],
            },
        );
    });
    let fetcher = SubstrateStorageFetcher::new("edgeware", api.clone());

    let events = fetcher
        .fetch_identities(&["alice".into(), "bob".into(), "carol".into()])
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    match &events[0].data {
        EventPayload::Substrate(SubstrateEvent::IdentitySet { who, judgements, .. }) => {
            assert_eq!(who, "alice");
            // Judgement from unknown registrar 3 is dropped.
            assert_eq!(judgements.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}
