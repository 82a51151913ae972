//! Typed access to positional event and extrinsic arguments.
//!
//! Runtime clients render numeric arguments either as JSON numbers, decimal
//! strings, or `0x` hex strings depending on width; these helpers accept all
//! three and always hand quantities back as decimal strings.

use chainevents_core::{Error, Result};
use serde_json::Value;

/// The `index`-th argument, or a decode error naming `what`.
pub fn arg<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a Value> {
    args.get(index)
        .ok_or_else(|| Error::Decode(format!("{what}: missing argument {index}")))
}

/// Account ids, hashes and other string-like values.
pub fn as_string(v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::Decode(format!("expected string, got {other}"))),
    }
}

/// Parses a balance into an integer.
pub fn balance_u128(v: &Value) -> Result<u128> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| Error::Decode(format!("invalid balance {n}"))),
        Value::String(s) => parse_u128(s),
        other => Err(Error::Decode(format!("expected balance, got {other}"))),
    }
}

/// A balance as a decimal string.
pub fn as_balance(v: &Value) -> Result<String> {
    balance_u128(v).map(|b| b.to_string())
}

pub fn as_u64(v: &Value) -> Result<u64> {
    let n = balance_u128(v)?;
    u64::try_from(n).map_err(|_| Error::Decode(format!("{n} does not fit in u64")))
}

pub fn as_u32(v: &Value) -> Result<u32> {
    let n = as_u64(v)?;
    u32::try_from(n).map_err(|_| Error::Decode(format!("{n} does not fit in u32")))
}

pub fn as_bool(v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        other => Err(Error::Decode(format!("expected bool, got {other}"))),
    }
}

/// A list of account ids. Tuple entries (`[who, stake]`) yield their first element.
pub fn as_accounts(v: &Value) -> Result<Vec<String>> {
    let items = v
        .as_array()
        .ok_or_else(|| Error::Decode(format!("expected list, got {v}")))?;
    items
        .iter()
        .map(|item| match item {
            Value::Array(tuple) => tuple
                .first()
                .ok_or_else(|| Error::Decode("empty tuple in account list".into()))
                .and_then(as_string),
            other => as_string(other),
        })
        .collect()
}

/// Result of a dispatch: a plain bool, or `{"Ok": ..}` / `{"Err": ..}`.
pub fn execution_ok(v: &Value) -> Result<bool> {
    match v {
        Value::Object(map) if map.contains_key("Ok") => Ok(true),
        Value::Object(map) if map.contains_key("Err") => Ok(false),
        other => as_bool(other),
    }
}

/// Decodes hex-encoded UTF-8 text. Input that is not hex is returned unchanged.
pub fn hex_to_utf8(s: &str) -> String {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    match hex::decode(stripped) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => s.to_string(),
    }
}

fn parse_u128(s: &str) -> Result<u128> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => s.replace(',', "").parse(),
    };
    parsed.map_err(|e| Error::Decode(format!("invalid integer '{s}': {e}")))
}

// ─── Votes ────────────────────────────────────────────────────────────────────

/// A standard (non-split) referendum vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardVote {
    pub is_aye: bool,
    pub conviction: u8,
    pub balance: String,
}

/// Parses an `AccountVote` argument.
///
/// Accepted shape: `{"Standard": {"vote": {"aye": bool, "conviction": ..}, "balance": ..}}`,
/// where conviction is an index or a name such as `"Locked3x"`. Split votes
/// are rejected.
pub fn parse_account_vote(v: &Value) -> Result<StandardVote> {
    if v.get("Split").is_some() {
        return Err(Error::Decode("split votes not supported".into()));
    }
    let standard = v
        .get("Standard")
        .ok_or_else(|| Error::Decode(format!("unrecognised vote {v}")))?;
    let vote = standard
        .get("vote")
        .ok_or_else(|| Error::Decode("vote missing 'vote'".into()))?;
    let is_aye = vote
        .get("aye")
        .ok_or_else(|| Error::Decode("vote missing 'aye'".into()))
        .and_then(as_bool)?;
    let conviction = vote
        .get("conviction")
        .map(parse_conviction)
        .transpose()?
        .unwrap_or(0);
    let balance = standard
        .get("balance")
        .ok_or_else(|| Error::Decode("vote missing 'balance'".into()))
        .and_then(as_balance)?;
    Ok(StandardVote {
        is_aye,
        conviction,
        balance,
    })
}

fn parse_conviction(v: &Value) -> Result<u8> {
    if let Some(name) = v.as_str() {
        return match name {
            "None" => Ok(0),
            other => other
                .strip_prefix("Locked")
                .and_then(|rest| rest.strip_suffix('x'))
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (1..=6).contains(n))
                .ok_or_else(|| Error::Decode(format!("unknown conviction '{other}'"))),
        };
    }
    let n = as_u32(v)?;
    u8::try_from(n)
        .ok()
        .filter(|n| *n <= 6)
        .ok_or_else(|| Error::Decode(format!("conviction {n} out of range")))
}
