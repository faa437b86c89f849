//! Payroll derivation
//!
//! Pure calculation of a month's totals from its attendance codes,
//! payment lists and carry-forward. Nothing here touches the database;
//! callers persist the derived closing balance themselves. Running the
//! calculation twice over the same record always yields the same totals.

use crate::attendance::{self, DayStatus};
use crate::db::models::EmployeeMonthRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How overtime hours convert to equivalent days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvertimePolicy {
    /// 8 overtime hours equal one day, fractional remainder pro-rata
    #[default]
    Standard,
    /// Whole 8-hour blocks equal one day each; leftover hours count
    /// 0.1 day apiece
    Special,
}

impl std::str::FromStr for OvertimePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "default" => Ok(Self::Standard),
            "special" => Ok(Self::Special),
            other => Err(format!("Unknown overtime policy: {other}")),
        }
    }
}

/// Derived totals for one employee month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollTotals {
    /// Days marked present
    pub total_days: u32,
    /// Sum of overtime hours over all days, present or absent
    pub total_overtime_hours: u32,
    /// Overtime hours converted to equivalent days
    pub overtime_days: f64,
    /// Present days plus overtime days
    pub total_attendance: f64,
    /// Rate times total attendance
    pub total_wage: f64,
    pub total_payouts: f64,
    pub total_additional_pays: f64,
    /// What the employee is owed at month end
    pub closing_balance: f64,
}

/// Convert a month's total overtime hours to equivalent days
pub fn overtime_days(total_hours: u32, policy: OvertimePolicy) -> f64 {
    match policy {
        OvertimePolicy::Standard => total_hours as f64 / 8.0,
        OvertimePolicy::Special => {
            let whole_blocks = (total_hours / 8) as f64;
            let leftover_hours = (total_hours % 8) as f64;
            whole_blocks + leftover_hours / 10.0
        }
    }
}

/// Derive the full totals for one month record
///
/// Invalid day-codes are skipped with a warning; they contribute neither
/// a present day nor overtime. Closing balance is
/// `wage + additional pays + carry forward - payouts`.
pub fn calculate(record: &EmployeeMonthRecord, policy: OvertimePolicy) -> PayrollTotals {
    let mut total_days = 0u32;
    let mut total_overtime_hours = 0u32;

    for (index, code) in record.attendance.iter().enumerate() {
        let decoded = attendance::decode(code);
        match decoded.status {
            DayStatus::Present => total_days += 1,
            DayStatus::Absent => {}
            DayStatus::Invalid => {
                warn!(
                    empid = %record.empid,
                    day = index + 1,
                    code = %code,
                    "Skipping invalid attendance code"
                );
            }
        }
        total_overtime_hours += decoded.overtime_hours;
    }

    let overtime_days = overtime_days(total_overtime_hours, policy);
    let total_attendance = total_days as f64 + overtime_days;
    let total_wage = record.rate * total_attendance;
    let total_payouts: f64 = record.payouts.iter().map(|p| p.value).sum();
    let total_additional_pays: f64 = record.additional_req_pays.iter().map(|p| p.value).sum();
    let closing_balance =
        total_wage + total_additional_pays + record.carry_forwarded.value - total_payouts;

    PayrollTotals {
        total_days,
        total_overtime_hours,
        overtime_days,
        total_attendance,
        total_wage,
        total_payouts,
        total_additional_pays,
        closing_balance,
    }
}
