use std::fmt;

use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::node::Revision;

/// Primary key of a row in the `changes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChangeKey(pub i64);

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Create => "create",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }

    pub(crate) fn parse(value: &str) -> Result<Self> {
        match value {
            "create" => Ok(ChangeOperation::Create),
            "update" => Ok(ChangeOperation::Update),
            "delete" => Ok(ChangeOperation::Delete),
            other => Err(StoreError::UnknownOperation(other.to_string())),
        }
    }
}

/// A change as written by the change-capture side, before it has a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChange {
    pub rev: Revision,
    pub table_name: String,
    pub operation: ChangeOperation,
    pub row_key: String,
    pub payload: Option<Vec<u8>>,
    /// Node id of the peer the change originated from, if remote.
    pub source: Option<String>,
}

impl NewChange {
    pub fn new(
        rev: impl Into<Revision>,
        table_name: impl Into<String>,
        operation: ChangeOperation,
        row_key: impl Into<String>,
    ) -> Self {
        Self {
            rev: rev.into(),
            table_name: table_name.into(),
            operation,
            row_key: row_key.into(),
            payload: None,
            source: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub change_id: ChangeKey,
    pub rev: Revision,
    pub table_name: String,
    pub operation: ChangeOperation,
    pub row_key: String,
    pub payload: Option<Vec<u8>>,
    pub source: Option<String>,
}
