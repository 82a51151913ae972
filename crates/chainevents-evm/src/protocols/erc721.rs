//! ERC-721 token transfers and approvals.
//!
//! `Transfer` shares its topic with ERC-20 but indexes the token id, so the
//! two families are told apart by the contracts they are configured for.

use alloy_primitives::B256;
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::payload::{Erc721Event, Erc721Kind};
use chainevents_core::{CanonicalEvent, Error, Network, Result};

use crate::abi::{address, decode_log};
use crate::client::RawLog;
use crate::protocol::ContractProtocol;

sol! {
    interface IERC721 {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
        event Approval(address indexed owner, address indexed approved, uint256 indexed tokenId);
        event ApprovalForAll(address indexed owner, address indexed operator, bool approved);
    }
}

const SIGNATURES: [(B256, Erc721Kind); 3] = [
    (IERC721::Transfer::SIGNATURE_HASH, Erc721Kind::Transfer),
    (IERC721::Approval::SIGNATURE_HASH, Erc721Kind::Approval),
    (IERC721::ApprovalForAll::SIGNATURE_HASH, Erc721Kind::ApprovalForAll),
];

#[derive(Debug, Default)]
pub struct Erc721Protocol;

impl Erc721Protocol {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContractProtocol for Erc721Protocol {
    type Kind = Erc721Kind;

    fn network(&self) -> Network {
        Network::Erc721
    }

    fn topics(&self) -> Vec<B256> {
        SIGNATURES.iter().map(|(topic, _)| *topic).collect()
    }

    fn classify(&self, log: &RawLog) -> Option<Erc721Kind> {
        let topic0 = log.topic0()?;
        SIGNATURES
            .iter()
            .find(|(topic, _)| *topic == topic0)
            .map(|(_, kind)| *kind)
    }

    async fn enrich(
        &self,
        chain: &str,
        block: u64,
        log: &RawLog,
        kind: Erc721Kind,
    ) -> Result<Option<CanonicalEvent>> {
        let token_address = log.address.to_lowercase();
        let decoded = match kind {
            Erc721Kind::Transfer => decode_log::<IERC721::Transfer>(log).map(|ev| {
                let (from, to) = (address(&ev.from), address(&ev.to));
                let parties = vec![from.clone(), to.clone()];
                CanonicalEvent::new(
                    chain,
                    block,
                    Erc721Event::Transfer {
                        token_address,
                        from,
                        to,
                        token_id: ev.tokenId.to_string(),
                    },
                )
                .exclude(parties)
            }),
            Erc721Kind::Approval => decode_log::<IERC721::Approval>(log).map(|ev| {
                let owner = address(&ev.owner);
                CanonicalEvent::new(
                    chain,
                    block,
                    Erc721Event::Approval {
                        token_address,
                        owner: owner.clone(),
                        approved: address(&ev.approved),
                        token_id: ev.tokenId.to_string(),
                    },
                )
                .exclude(vec![owner])
            }),
            Erc721Kind::ApprovalForAll => decode_log::<IERC721::ApprovalForAll>(log).map(|ev| {
                let owner = address(&ev.owner);
                CanonicalEvent::new(
                    chain,
                    block,
                    Erc721Event::ApprovalForAll {
                        token_address,
                        owner: owner.clone(),
                        operator: address(&ev.operator),
                        approved: ev.approved,
                    },
                )
                .exclude(vec![owner])
            }),
        };
        decoded
            .map(Some)
            .map_err(|e| Error::enrich(kind, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};
    use chainevents_core::EventPayload;

    const TOKEN: &str = "0x00000000000000000000000000000000000000Dd";

    fn log_of<E: SolEvent>(ev: &E) -> RawLog {
        let data = ev.encode_log_data();
        RawLog::new(TOKEN, 9, 0, data.topics(), &data.data)
    }

    #[tokio::test]
    async fn transfer_carries_decimal_token_id() {
        let log = log_of(&IERC721::Transfer {
            from: address!("00000000000000000000000000000000000000aa"),
            to: address!("00000000000000000000000000000000000000bb"),
            tokenId: U256::from(1u128 << 70),
        });
        let p = Erc721Protocol::new();
        let kind = p.classify(&log).unwrap();
        assert_eq!(kind, Erc721Kind::Transfer);

        let ev = p.enrich("bayc", 9, &log, kind).await.unwrap().unwrap();
        assert_eq!(ev.network(), Network::Erc721);
        assert_eq!(ev.include_addresses, None);
        assert_eq!(
            ev.exclude_addresses,
            Some(vec![
                "0x00000000000000000000000000000000000000aa".to_string(),
                "0x00000000000000000000000000000000000000bb".to_string(),
            ])
        );
        match ev.data {
            EventPayload::Erc721(Erc721Event::Transfer { token_address, token_id, .. }) => {
                assert_eq!(token_address, TOKEN.to_lowercase());
                assert_eq!(token_id, "1180591620717411303424");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn approvals_decode() {
        let p = Erc721Protocol::new();
        let approval = log_of(&IERC721::Approval {
            owner: address!("00000000000000000000000000000000000000aa"),
            approved: address!("00000000000000000000000000000000000000cc"),
            tokenId: U256::from(42u64),
        });
        let ev = p.enrich("bayc", 9, &approval, Erc721Kind::Approval).await.unwrap().unwrap();
        assert_eq!(
            ev.data,
            EventPayload::Erc721(Erc721Event::Approval {
                token_address: TOKEN.to_lowercase(),
                owner: "0x00000000000000000000000000000000000000aa".into(),
                approved: "0x00000000000000000000000000000000000000cc".into(),
                token_id: "42".into(),
            })
        );

        let for_all = log_of(&IERC721::ApprovalForAll {
            owner: address!("00000000000000000000000000000000000000aa"),
            operator: address!("00000000000000000000000000000000000000ee"),
            approved: true,
        });
        let kind = p.classify(&for_all).unwrap();
        assert_eq!(kind, Erc721Kind::ApprovalForAll);
        let ev = p.enrich("bayc", 9, &for_all, kind).await.unwrap().unwrap();
        assert_eq!(
            ev.exclude_addresses,
            Some(vec!["0x00000000000000000000000000000000000000aa".to_string()])
        );
        assert!(matches!(
            ev.data,
            EventPayload::Erc721(Erc721Event::ApprovalForAll { approved: true, .. })
        ));
    }

    #[tokio::test]
    async fn erc20_shaped_transfer_is_an_enrich_error() {
        // Three topics: the amount sits in data, not in an indexed token id.
        let log = RawLog::new(
            TOKEN,
            9,
            0,
            &[
                IERC721::Transfer::SIGNATURE_HASH,
                B256::left_padding_from(&[0xaa]),
                B256::left_padding_from(&[0xbb]),
            ],
            &U256::from(5u64).to_be_bytes::<32>(),
        );
        let err = Erc721Protocol::new()
            .enrich("bayc", 9, &log, Erc721Kind::Transfer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Enrich { .. }));
    }
}
