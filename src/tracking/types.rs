//! Change ledger type definitions
//!
//! Core data structures of the audit-grade change ledger. Entries are
//! immutable, never deleted, and carry a SHA256 hash chain for tamper
//! evidence.

use serde::{Deserialize, Serialize};

/// Field of an employee month record a ledger entry refers to
///
/// Enumerated rather than free text so unknown fields cannot creep into
/// the ledger. `Record` marks whole-record lifecycle events (creation,
/// deletion, import) rather than a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    Attendance,
    Payouts,
    AdditionalReqPays,
    Rate,
    Record,
}

impl ChangeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Payouts => "payouts",
            Self::AdditionalReqPays => "additional_req_pays",
            Self::Rate => "rate",
            Self::Record => "record",
        }
    }
}

impl std::str::FromStr for ChangeField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendance" => Ok(Self::Attendance),
            "payouts" => Ok(Self::Payouts),
            "additional_req_pays" => Ok(Self::AdditionalReqPays),
            "rate" => Ok(Self::Rate),
            "record" => Ok(Self::Record),
            other => Err(format!("Unknown change field: {other}")),
        }
    }
}

/// Kind of change a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(Self::Added),
            "removed" => Ok(Self::Removed),
            "modified" => Ok(Self::Modified),
            other => Err(format!("Unknown change type: {other}")),
        }
    }
}

/// One atomic detected change
///
/// Carries enough structured data to reconstruct a human-readable audit
/// message without consulting the record it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicChange {
    pub field: ChangeField,
    pub change_type: ChangeType,
    /// Human-readable one-liner, e.g. `Day 4 attendance changed from 'A' to 'P8'`
    pub description: String,
    /// Field-specific structured payload
    pub data: serde_json::Value,
}

/// Metadata stamped onto every ledger entry written for one operation
#[derive(Debug, Clone)]
pub struct ChangeContext {
    pub site_id: String,
    pub empid: String,
    pub month: u32,
    pub year: i32,
    pub changed_by: String,
    pub remark: Option<String>,
}

/// One persisted ledger entry (immutable)
///
/// - `prev_hash`: hash of the preceding entry, `"genesis"` for the first
/// - `curr_hash`: SHA256 over prev_hash plus every stored field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Globally increasing sequence number
    pub sequence: i64,
    pub site_id: String,
    pub empid: String,
    pub month: u32,
    pub year: i32,
    pub field: ChangeField,
    pub change_type: ChangeType,
    pub description: String,
    pub data: serde_json::Value,
    pub changed_by: String,
    pub remark: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
    pub prev_hash: String,
    pub curr_hash: String,
}

/// Ledger query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeLogQuery {
    pub site_id: Option<String>,
    pub empid: Option<String>,
    pub field: Option<ChangeField>,
    pub change_type: Option<ChangeType>,
    pub changed_by: Option<String>,
    /// Start of time window (unix millis, inclusive)
    pub from: Option<i64>,
    /// End of time window (unix millis, inclusive)
    pub to: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for ChangeLogQuery {
    fn default() -> Self {
        Self {
            site_id: None,
            empid: None,
            field: None,
            change_type: None,
            changed_by: None,
            from: None,
            to: None,
            offset: 0,
            limit: default_limit(),
        }
    }
}

fn default_limit() -> i64 {
    50
}

/// Ledger list response
#[derive(Debug, Serialize)]
pub struct ChangeLogListResponse {
    pub items: Vec<ChangeLogEntry>,
    /// Total matching entries before pagination
    pub total: i64,
}

/// Hash chain verification result
#[derive(Debug, Serialize)]
pub struct ChainVerification {
    pub total_entries: i64,
    pub chain_intact: bool,
    pub breaks: Vec<ChainBreak>,
}

/// One detected break in the hash chain
#[derive(Debug, Serialize)]
pub struct ChainBreak {
    /// Sequence of the entry that failed verification
    pub sequence: i64,
    pub expected_hash: String,
    pub actual_hash: String,
}
