//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

// ─── Network ──────────────────────────────────────────────────────────────────

/// The family of chain an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    /// Runtime-events chain (Substrate-style `section.method` records).
    Substrate,
    /// Compound-style governor contract.
    Compound,
    /// Aave governance v2 and its governance token.
    Aave,
    /// Moloch v1 DAO.
    Moloch,
    /// ERC-20 token contracts.
    Erc20,
    /// ERC-721 token contracts.
    Erc721,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Substrate => "substrate",
            Self::Compound => "compound",
            Self::Aave => "aave",
            Self::Moloch => "moloch",
            Self::Erc20 => "erc20",
            Self::Erc721 => "erc721",
        }
    }

    /// Returns `true` for networks whose events are EVM logs.
    pub fn is_contract_based(&self) -> bool {
        !matches!(self, Self::Substrate)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substrate" => Ok(Self::Substrate),
            "compound" => Ok(Self::Compound),
            "aave" => Ok(Self::Aave),
            "moloch" => Ok(Self::Moloch),
            "erc20" => Ok(Self::Erc20),
            "erc721" => Ok(Self::Erc721),
            other => Err(crate::error::Error::Config(format!(
                "unsupported network '{other}'"
            ))),
        }
    }
}

// ─── DisconnectedRange ────────────────────────────────────────────────────────

/// A block interval to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectedRange {
    /// First block to recover (inclusive).
    pub start_block: u64,
    /// Last block to recover (inclusive); `None` = chain head.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_block: Option<u64>,
    /// Upper bound on the number of entities a storage fetch may return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl DisconnectedRange {
    /// An open-ended range starting at `start_block`.
    pub fn from_block(start_block: u64) -> Self {
        Self {
            start_block,
            end_block: None,
            max_results: None,
        }
    }

    /// A closed range `[start_block, end_block]`.
    pub fn between(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block,
            end_block: Some(end_block),
            max_results: None,
        }
    }

    /// Limit the number of storage entities returned.
    pub fn max_results(mut self, n: usize) -> Self {
        self.max_results = Some(n);
        self
    }

    /// Returns the inclusive end, falling back to `head`.
    pub fn end_or(&self, head: u64) -> u64 {
        self.end_block.unwrap_or(head)
    }

    /// Returns `true` if `block` lies inside the range (open end = unbounded).
    pub fn contains(&self, block: u64) -> bool {
        block >= self.start_block && self.end_block.map_or(true, |end| block <= end)
    }
}

// ─── BlockSummary ─────────────────────────────────────────────────────────────

/// A minimal summary of a block, enough to drive polling and timestamp search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
