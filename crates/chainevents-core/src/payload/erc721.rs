//! Payloads emitted by ERC-721 (non-fungible token) contracts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Erc721Kind {
    Transfer,
    Approval,
    ApprovalForAll,
}

impl Erc721Kind {
    pub const ALL: [Erc721Kind; 3] = [Self::Transfer, Self::Approval, Self::ApprovalForAll];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Approval => "approval",
            Self::ApprovalForAll => "approval-for-all",
        }
    }
}

impl std::fmt::Display for Erc721Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token ids are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Erc721Event {
    Transfer {
        token_address: String,
        from: String,
        to: String,
        token_id: String,
    },
    Approval {
        token_address: String,
        owner: String,
        approved: String,
        token_id: String,
    },
    ApprovalForAll {
        token_address: String,
        owner: String,
        operator: String,
        approved: bool,
    },
}

impl Erc721Event {
    pub fn kind(&self) -> Erc721Kind {
        match self {
            Self::Transfer { .. } => Erc721Kind::Transfer,
            Self::Approval { .. } => Erc721Kind::Approval,
            Self::ApprovalForAll { .. } => Erc721Kind::ApprovalForAll,
        }
    }

    pub fn token_address(&self) -> &str {
        match self {
            Self::Transfer { token_address, .. }
            | Self::Approval { token_address, .. }
            | Self::ApprovalForAll { token_address, .. } => token_address,
        }
    }
}
