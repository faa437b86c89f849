//! Forward recalculation of carry-forward balances
//!
//! A month's closing balance feeds the next month's carry-forward, so an
//! edit to an earlier month leaves every later month of that employee
//! holding a stale balance. Instead of recalculating eagerly, later
//! months are flagged (`recalculation_needed`) and repaired by an
//! explicit sweep: oldest flagged month first, pulling the closing
//! balance of its calendar predecessor, recomputing, clearing the flag,
//! then moving to the next. Because repair runs oldest-first, the
//! predecessor of the month being repaired is never itself flagged.

use crate::db::models::CarryForward;
use crate::db::repository::{RepoError, employee_month};
use crate::payroll::{self, OvertimePolicy};
use crate::utils::AppError;
use crate::utils::time;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

/// Most months one sweep may repair for one employee
///
/// A chain longer than this indicates runaway flagging, not real data;
/// the sweep aborts rather than loop.
pub const MAX_SWEEP_ITERATIONS: u32 = 50;

#[derive(Debug, Error)]
pub enum RecalcError {
    #[error("Recalculation cap of {max} months exceeded for {empid}")]
    DepthExceeded { empid: String, max: u32 },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub type RecalcResult<T> = Result<T, RecalcError>;

impl From<RecalcError> for AppError {
    fn from(err: RecalcError) -> Self {
        match err {
            RecalcError::DepthExceeded { .. } => AppError::business_rule(err.to_string()),
            RecalcError::Repo(repo) => repo.into(),
        }
    }
}

/// Outcome of one employee's sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub empid: String,
    pub months_recalculated: u32,
}

/// Outcome of a batch sweep over several employees
#[derive(Debug, Default, Serialize)]
pub struct BatchSweepReport {
    /// Employees swept without error
    pub processed: u32,
    pub months_recalculated: u32,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub empid: String,
    pub error: String,
}

/// Flag every month of the employee strictly after (month, year)
///
/// Returns the number of months flagged.
pub async fn mark_later_months_dirty(
    pool: &SqlitePool,
    site_id: &str,
    empid: &str,
    month: u32,
    year: i32,
) -> RecalcResult<u64> {
    let flagged = employee_month::mark_later_months_dirty(pool, site_id, empid, month, year).await?;
    if flagged > 0 {
        tracing::debug!(
            empid = %empid,
            month,
            year,
            flagged,
            "Flagged later months for recalculation"
        );
    }
    Ok(flagged)
}

/// Repair every flagged month of one employee, oldest first
///
/// Each iteration reloads the oldest flagged month, replaces its
/// carry-forward with the closing balance of the preceding calendar
/// month (0 when that month has no record), recomputes totals and
/// persists with the flag cleared. Callers are expected to hold the
/// employee's write lock.
pub async fn sweep_employee(
    pool: &SqlitePool,
    site_id: &str,
    empid: &str,
    policy: OvertimePolicy,
) -> RecalcResult<SweepReport> {
    let mut months_recalculated = 0u32;

    loop {
        let Some(mut record) = employee_month::find_oldest_dirty(pool, site_id, empid).await?
        else {
            break;
        };

        if months_recalculated >= MAX_SWEEP_ITERATIONS {
            return Err(RecalcError::DepthExceeded {
                empid: empid.to_string(),
                max: MAX_SWEEP_ITERATIONS,
            });
        }

        let (prev_month, prev_year) = time::previous_month(record.month, record.year);
        let carry = employee_month::find_closing_balance(pool, empid, prev_month, prev_year)
            .await?
            .unwrap_or(0.0);

        record.carry_forwarded = CarryForward {
            value: carry,
            remark: Some(format!("Carried forward from {prev_month}/{prev_year}")),
            date: Some(time::today_string()),
        };
        let totals = payroll::calculate(&record, policy);
        record.closing_balance = totals.closing_balance;
        record.recalculation_needed = false;

        employee_month::update(pool, &record).await?;
        months_recalculated += 1;

        tracing::debug!(
            empid = %empid,
            month = record.month,
            year = record.year,
            closing_balance = record.closing_balance,
            "Recalculated month"
        );
    }

    Ok(SweepReport {
        empid: empid.to_string(),
        months_recalculated,
    })
}
