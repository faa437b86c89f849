//! Employee month record models
//!
//! One row per employee per calendar month. The attendance array and the
//! two payment lists are stored as JSON text columns; everything an
//! operator can edit lives here, everything derived (closing balance) is
//! recomputed by the payroll calculator and persisted alongside.

use serde::{Deserialize, Serialize};

/// A single payment item: a payout handed to the employee, or an
/// additional required pay owed to them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayItem {
    /// Amount; missing values deserialize to 0
    #[serde(default)]
    pub value: f64,
    /// Calendar date `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Balance carried over from the previous month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarryForward {
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// One employee's payroll record for a single month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeMonthRecord {
    #[serde(default)]
    pub id: i64,
    pub site_id: String,
    pub empid: String,
    pub name: String,
    /// Calendar month, 1-12
    pub month: u32,
    pub year: i32,
    /// Daily wage rate
    pub rate: f64,
    /// Day-codes, index 0 = day 1 of the month
    #[serde(default)]
    pub attendance: Vec<String>,
    /// Money paid out to the employee during the month
    #[serde(default)]
    pub payouts: Vec<PayItem>,
    /// Extra amounts owed to the employee (bonuses, reimbursements)
    #[serde(default)]
    pub additional_req_pays: Vec<PayItem>,
    #[serde(default)]
    pub carry_forwarded: CarryForward,
    /// Derived: what the employee is owed at month end
    #[serde(default)]
    pub closing_balance: f64,
    /// Set when an earlier month changed and this one holds a stale carry
    #[serde(default)]
    pub recalculation_needed: bool,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Payload for creating a new employee's first month record
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeCreate {
    pub name: String,
    pub site_id: String,
    /// Daily wage rate, must be positive
    pub rate: f64,
    /// Defaults to the current month
    #[serde(default)]
    pub month: Option<u32>,
    /// Defaults to the current year
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Partial update for one month record; `None` fields are left untouched
///
/// Tracked list fields replace wholesale. The carry-forward object merges
/// per sub-field instead, so a client can adjust the value without
/// resending remark and date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeMonthPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub attendance: Option<Vec<String>>,
    #[serde(default)]
    pub payouts: Option<Vec<PayItem>>,
    #[serde(default)]
    pub additional_req_pays: Option<Vec<PayItem>>,
    #[serde(default)]
    pub carry_forwarded: Option<CarryForwardPatch>,
}

/// Per-sub-field merge for [`CarryForward`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarryForwardPatch {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}
