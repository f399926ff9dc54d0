use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::error::{Result, StoreError};

/// A position in the change log. Both `changes.rev` and the parsed form of
/// `sync_nodes.my_revision` live in this space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Revision(pub i64);

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Revision(value)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Revision {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Revision {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Revision)
    }
}

/// The revision a sync node still needs, exactly as the replication
/// protocol stored it. Peers may write either an integer or its string
/// form, so comparisons must go through [`RevisionMarker::to_revision`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RevisionMarker {
    Number(i64),
    /// A SQLite REAL. Only trusted while every integer up to its magnitude
    /// is exactly representable.
    Float(f64),
    Text(String),
}

impl RevisionMarker {
    /// Numeric value of the marker.
    ///
    /// Text markers are trimmed and read as exact decimals: an integer, or
    /// a whole number written with a zero fraction or an exponent (`"5.0"`,
    /// `"1e3"`). Floats must be whole and no larger than 2^53 in magnitude.
    /// Anything else, including values outside the i64 range, is malformed.
    pub fn to_revision(&self) -> Result<Revision> {
        match self {
            RevisionMarker::Number(value) => Ok(Revision(*value)),
            RevisionMarker::Float(value) => float_revision(*value)
                .ok_or_else(|| StoreError::MalformedRevision(value.to_string())),
            RevisionMarker::Text(raw) => {
                parse_text_revision(raw).ok_or_else(|| StoreError::MalformedRevision(raw.clone()))
            }
        }
    }
}

// 2^53: above this a float no longer pins down a single integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

fn float_revision(value: f64) -> Option<Revision> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT {
        Some(Revision(value as i64))
    } else {
        None
    }
}

fn parse_text_revision(raw: &str) -> Option<Revision> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Revision(value));
    }
    parse_whole_decimal(trimmed).map(Revision)
}

/// Exact value of `[+-]digits[.digits][(e|E)[+-]digits]`, if it is a whole
/// number that fits in an i64. No floating point is involved.
fn parse_whole_decimal(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.as_bytes().first().copied()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
        Some(idx) => (&unsigned[..idx], unsigned[idx + 1..].parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    // value = digits * 10^scale
    let digits = [whole, fraction].concat();
    let digits = digits.trim_start_matches('0');
    let scale = i64::from(exponent) - fraction.len() as i64;

    let magnitude: i128 = if digits.is_empty() {
        0
    } else if scale < 0 {
        let dropped = usize::try_from(-scale).ok()?;
        if dropped >= digits.len() {
            // Non-zero and entirely fractional.
            return None;
        }
        let (kept, dropped) = digits.split_at(digits.len() - dropped);
        if dropped.bytes().any(|b| b != b'0') {
            return None;
        }
        kept.parse().ok()?
    } else {
        let mut value: i128 = digits.parse().ok()?;
        for _ in 0..scale {
            value = value.checked_mul(10)?;
        }
        value
    };

    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

impl From<i64> for RevisionMarker {
    fn from(value: i64) -> Self {
        RevisionMarker::Number(value)
    }
}

impl From<&str> for RevisionMarker {
    fn from(value: &str) -> Self {
        RevisionMarker::Text(value.to_string())
    }
}

impl From<String> for RevisionMarker {
    fn from(value: String) -> Self {
        RevisionMarker::Text(value)
    }
}

impl fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionMarker::Number(value) => write!(f, "{}", value),
            RevisionMarker::Float(value) => write!(f, "{:?}", value),
            RevisionMarker::Text(raw) => write!(f, "{:?}", raw),
        }
    }
}

impl ToSql for RevisionMarker {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RevisionMarker::Number(value) => Ok(ToSqlOutput::from(*value)),
            RevisionMarker::Float(value) => Ok(ToSqlOutput::from(*value)),
            RevisionMarker::Text(raw) => Ok(ToSqlOutput::from(raw.as_str())),
        }
    }
}

impl FromSql for RevisionMarker {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(value) => Ok(RevisionMarker::Number(value)),
            ValueRef::Real(value) => Ok(RevisionMarker::Float(value)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|raw| RevisionMarker::Text(raw.to_string()))
                .map_err(|err| FromSqlError::Other(Box::new(err))),
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Local,
    Remote,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Local => "local",
            NodeKind::Remote => "remote",
        }
    }

    pub(crate) fn parse(value: &str) -> Result<Self> {
        match value {
            "local" => Ok(NodeKind::Local),
            "remote" => Ok(NodeKind::Remote),
            other => Err(StoreError::UnknownNodeKind(other.to_string())),
        }
    }
}

/// Subscription state of one peer. Written by the replication protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncNode {
    pub node_id: String,
    pub kind: NodeKind,
    /// Lowest revision this peer has not consumed yet.
    pub my_revision: RevisionMarker,
}

impl SyncNode {
    pub fn new(
        node_id: impl Into<String>,
        kind: NodeKind,
        my_revision: impl Into<RevisionMarker>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            my_revision: my_revision.into(),
        }
    }

    pub fn remote(node_id: impl Into<String>, my_revision: impl Into<RevisionMarker>) -> Self {
        Self::new(node_id, NodeKind::Remote, my_revision)
    }

    pub fn local(node_id: impl Into<String>, my_revision: impl Into<RevisionMarker>) -> Self {
        Self::new(node_id, NodeKind::Local, my_revision)
    }
}
