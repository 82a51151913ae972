//! Payloads emitted by ERC-20 token contracts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Erc20Kind {
    Transfer,
    Approval,
}

impl Erc20Kind {
    pub const ALL: [Erc20Kind; 2] = [Self::Transfer, Self::Approval];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Approval => "approval",
        }
    }
}

impl std::fmt::Display for Erc20Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Erc20Event {
    Transfer {
        token_address: String,
        from: String,
        to: String,
        value: String,
    },
    Approval {
        token_address: String,
        owner: String,
        spender: String,
        value: String,
    },
}

impl Erc20Event {
    pub fn kind(&self) -> Erc20Kind {
        match self {
            Self::Transfer { .. } => Erc20Kind::Transfer,
            Self::Approval { .. } => Erc20Kind::Approval,
        }
    }

    pub fn token_address(&self) -> &str {
        match self {
            Self::Transfer { token_address, .. } | Self::Approval { token_address, .. } => {
                token_address
            }
        }
    }
}
