//! EmployeeManager - façade for payroll record mutations
//!
//! Every write to an employee month record goes through here. The manager
//! owns a per-employee mutex map, so updates and recalculation sweeps for
//! the same employee are serialized while different employees proceed
//! concurrently.
//!
//! # Update Flow
//!
//! ```text
//! update_employee(empid, month, year, patch, actor, remark)
//!     ├─ 1. Validate input, acquire the employee lock
//!     ├─ 2. Load the record (NotFound if absent)
//!     ├─ 3. Snapshot tracked fields as "old"
//!     ├─ 4. Apply the patch (tracked fields replace, carry-forward merges)
//!     ├─ 5. Recalculate totals, persist with the dirty flag cleared
//!     ├─ 6. Snapshot "new", diff against "old"
//!     ├─ 7. Record one ledger entry per atomic change (best effort)
//!     ├─ 8. Flag later months for recalculation
//!     └─ 9. Return record + totals + tracking status
//! ```
//!
//! A ledger failure in step 7 never rolls back the data write from step 5;
//! it is reported in [`UpdateOutcome::tracking_error`] so the caller can
//! retry the audit out of band. Deletions invert that order: the snapshot
//! entry is written first and a ledger failure aborts the deletion, so no
//! record can vanish unaudited.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::models::{
    CarryForward, EmployeeCreate, EmployeeMonthPatch, EmployeeMonthRecord, PayItem,
};
use crate::db::repository::employee_month as repo;
use crate::payroll::{self, OvertimePolicy, PayrollTotals};
use crate::recalc::{self, BatchSweepReport, SweepFailure};
use crate::tracking::diff::{self, TrackedSnapshot};
use crate::tracking::{AtomicChange, ChangeContext, ChangeField, ChangeLedger, ChangeType};
use crate::utils::time;
use crate::utils::{AppError, AppResult};

const MIN_YEAR: i32 = 2000;

/// Actor recorded when a request carries no explicit one
const SYSTEM_ACTOR: &str = "system";

/// Result of a single-month update
#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
    pub record: EmployeeMonthRecord,
    pub totals: PayrollTotals,
    /// Ledger entries written for this update
    pub changes_written: usize,
    /// Later months flagged for recalculation
    pub later_months_flagged: u64,
    /// Set when the data write succeeded but the ledger write failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_error: Option<String>,
}

/// Copy a site's records from one calendar month into another
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub site_id: String,
    pub source_month: u32,
    pub source_year: i32,
    pub target_month: u32,
    pub target_year: i32,
    /// Restrict the import to these employees; `None` imports the whole site
    #[serde(default)]
    pub employee_ids: Option<Vec<String>>,
    /// Seed each target carry-forward with the source closing balance
    #[serde(default = "default_true")]
    pub preserve_carry_forward: bool,
    /// Copy additional pays instead of starting the month empty
    #[serde(default)]
    pub preserve_additional_pays: bool,
    #[serde(default)]
    pub changed_by: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: u32,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Serialize)]
pub struct ImportFailure {
    pub empid: String,
    pub error: String,
}

pub struct EmployeeManager {
    pool: SqlitePool,
    ledger: ChangeLedger,
    policy: OvertimePolicy,
    /// Per-employee write locks; one employee's months mutate sequentially
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EmployeeManager {
    pub fn new(pool: SqlitePool, ledger: ChangeLedger, policy: OvertimePolicy) -> Self {
        Self {
            pool,
            ledger,
            policy,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, empid: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(empid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create an employee with the next `EMP###` serial id
    ///
    /// Month and year default to the current date. The created record is
    /// mirrored into the ledger as a lifecycle entry.
    pub async fn create_employee(&self, data: EmployeeCreate) -> AppResult<EmployeeMonthRecord> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if data.site_id.trim().is_empty() {
            return Err(AppError::validation("site_id is required"));
        }
        if !data.rate.is_finite() || data.rate <= 0.0 {
            return Err(AppError::validation(format!(
                "rate must be positive, got {}",
                data.rate
            )));
        }

        let (current_month, current_year) = time::current_month_year();
        let month = data.month.unwrap_or(current_month);
        let year = data.year.unwrap_or(current_year);
        validate_month_year(month, year)?;

        let created_by = data
            .created_by
            .clone()
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        let now = time::now_millis();
        let record = EmployeeMonthRecord {
            id: 0,
            site_id: data.site_id.trim().to_string(),
            // Placeholder; insert_with_serial assigns the real empid
            empid: String::new(),
            name: name.to_string(),
            month,
            year,
            rate: data.rate,
            attendance: Vec::new(),
            payouts: Vec::new(),
            additional_req_pays: Vec::new(),
            carry_forwarded: CarryForward::default(),
            closing_balance: 0.0,
            recalculation_needed: false,
            created_by: created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        let record = repo::insert_with_serial(&self.pool, &record).await?;

        let change = lifecycle_change(
            ChangeType::Added,
            format!("Created employee {} ({})", record.empid, record.name),
            &record,
        );
        let ctx = ChangeContext {
            site_id: record.site_id.clone(),
            empid: record.empid.clone(),
            month,
            year,
            changed_by: created_by,
            remark: None,
        };
        if let Err(e) = self.ledger.record(&[change], &ctx).await {
            warn!(empid = %record.empid, error = %e, "Ledger write failed for created employee");
        }

        info!(empid = %record.empid, site_id = %record.site_id, month, year, "Employee created");
        Ok(record)
    }

    /// Fetch one month record, repairing it first if it is flagged stale
    ///
    /// The returned closing balance is always trustworthy: a flagged
    /// record triggers the full sweep for that employee before the
    /// record is re-read.
    pub async fn get_employee(
        &self,
        empid: &str,
        month: u32,
        year: i32,
    ) -> AppResult<(EmployeeMonthRecord, PayrollTotals)> {
        validate_month_year(month, year)?;

        let record = repo::find(&self.pool, empid, month, year)
            .await?
            .ok_or_else(|| record_not_found(empid, month, year))?;

        let record = if record.recalculation_needed {
            let lock = self.lock_for(empid);
            let _guard = lock.lock().await;

            let report =
                recalc::sweep_employee(&self.pool, &record.site_id, empid, self.policy).await?;
            debug!(empid = %empid, months = report.months_recalculated, "Read triggered recalculation");

            repo::find(&self.pool, empid, month, year)
                .await?
                .ok_or_else(|| record_not_found(empid, month, year))?
        } else {
            record
        };

        let totals = payroll::calculate(&record, self.policy);
        Ok((record, totals))
    }

    /// All records of a site for one calendar month
    ///
    /// Listing does not repair; stale rows are visible through their
    /// `recalculation_needed` flag.
    pub async fn list_employees(
        &self,
        site_id: &str,
        month: u32,
        year: i32,
    ) -> AppResult<Vec<EmployeeMonthRecord>> {
        validate_month_year(month, year)?;
        let records = repo::find_by_site_month(&self.pool, site_id, month, year).await?;
        Ok(records)
    }

    /// Apply a partial update to one month record
    pub async fn update_employee(
        &self,
        empid: &str,
        month: u32,
        year: i32,
        patch: EmployeeMonthPatch,
        changed_by: &str,
        remark: Option<String>,
    ) -> AppResult<UpdateOutcome> {
        validate_month_year(month, year)?;
        validate_patch(&patch, month, year)?;

        let lock = self.lock_for(empid);
        let _guard = lock.lock().await;

        let mut record = repo::find(&self.pool, empid, month, year)
            .await?
            .ok_or_else(|| record_not_found(empid, month, year))?;
        let previous_closing = record.closing_balance;
        let old = TrackedSnapshot::from(&record);

        apply_patch(&mut record, patch);

        let totals = payroll::calculate(&record, self.policy);
        record.closing_balance = totals.closing_balance;
        record.recalculation_needed = false;
        let record = repo::update(&self.pool, &record).await?;

        let new = TrackedSnapshot::from(&record);
        let changes = diff::diff(&old, &new, month, year);

        let ctx = ChangeContext {
            site_id: record.site_id.clone(),
            empid: empid.to_string(),
            month,
            year,
            changed_by: changed_by.to_string(),
            remark,
        };
        let (changes_written, tracking_error) = match self.ledger.record(&changes, &ctx).await {
            Ok(written) => (written, None),
            Err(e) => {
                warn!(
                    empid = %empid,
                    month,
                    year,
                    error = %e,
                    "Change tracking failed after successful data write"
                );
                (0, Some(e.to_string()))
            }
        };

        // Later months only go stale when the balance chain moved. A
        // rename alone leaves them clean.
        let balance_changed = (record.closing_balance - previous_closing).abs() > diff::FLOAT_EPSILON;
        let later_months_flagged = if balance_changed || !changes.is_empty() {
            recalc::mark_later_months_dirty(&self.pool, &record.site_id, empid, month, year).await?
        } else {
            0
        };

        info!(
            empid = %empid,
            month,
            year,
            changes_written,
            later_months_flagged,
            "Employee updated"
        );

        Ok(UpdateOutcome {
            record,
            totals,
            changes_written,
            later_months_flagged,
            tracking_error,
        })
    }

    /// Delete one month record, snapshotting it into the ledger first
    pub async fn delete_month(
        &self,
        empid: &str,
        month: u32,
        year: i32,
        changed_by: &str,
        remark: Option<String>,
    ) -> AppResult<()> {
        validate_month_year(month, year)?;

        let lock = self.lock_for(empid);
        let _guard = lock.lock().await;

        let record = repo::find(&self.pool, empid, month, year)
            .await?
            .ok_or_else(|| record_not_found(empid, month, year))?;

        let change = lifecycle_change(
            ChangeType::Removed,
            format!("Deleted record for {empid} {month}/{year}"),
            &record,
        );
        let ctx = ChangeContext {
            site_id: record.site_id.clone(),
            empid: empid.to_string(),
            month,
            year,
            changed_by: changed_by.to_string(),
            remark,
        };
        self.ledger.record(&[change], &ctx).await?;

        repo::delete(&self.pool, empid, month, year).await?;
        info!(empid = %empid, month, year, "Employee month deleted");
        Ok(())
    }

    /// Delete every month record of an employee
    ///
    /// Writes one ledger snapshot per month before any row is removed.
    /// Returns the number of months deleted.
    pub async fn delete_employee(
        &self,
        empid: &str,
        changed_by: &str,
        remark: Option<String>,
    ) -> AppResult<u64> {
        let lock = self.lock_for(empid);
        let _guard = lock.lock().await;

        let records = repo::find_all_months(&self.pool, empid).await?;
        if records.is_empty() {
            return Err(AppError::not_found(format!(
                "No records found for employee {empid}"
            )));
        }

        for record in &records {
            let change = lifecycle_change(
                ChangeType::Removed,
                format!(
                    "Deleted record for {} {}/{}",
                    record.empid, record.month, record.year
                ),
                record,
            );
            let ctx = ChangeContext {
                site_id: record.site_id.clone(),
                empid: empid.to_string(),
                month: record.month,
                year: record.year,
                changed_by: changed_by.to_string(),
                remark: remark.clone(),
            };
            self.ledger.record(&[change], &ctx).await?;
        }

        let removed = repo::delete_all_months(&self.pool, empid).await?;
        info!(empid = %empid, removed, "Employee deleted across all months");
        Ok(removed)
    }

    /// Copy a site's roster from one month into another
    ///
    /// Conflicts fail the whole request with a 409 before anything is
    /// written; a partial import would leave the target month
    /// half-populated with no way to tell which half. Per-employee
    /// failures after that gate are collected, not fatal.
    pub async fn import_between_months(&self, req: ImportRequest) -> AppResult<ImportReport> {
        validate_month_year(req.source_month, req.source_year)?;
        validate_month_year(req.target_month, req.target_year)?;
        if (req.source_month, req.source_year) == (req.target_month, req.target_year) {
            return Err(AppError::validation("source and target month must differ"));
        }

        let mut sources =
            repo::find_by_site_month(&self.pool, &req.site_id, req.source_month, req.source_year)
                .await?;
        if let Some(ids) = &req.employee_ids {
            sources.retain(|r| ids.contains(&r.empid));
        }
        if sources.is_empty() {
            return Err(AppError::not_found(format!(
                "No records for site {} in {}/{}",
                req.site_id, req.source_month, req.source_year
            )));
        }

        let mut conflicts = Vec::new();
        for source in &sources {
            if repo::find(&self.pool, &source.empid, req.target_month, req.target_year)
                .await?
                .is_some()
            {
                conflicts.push(source.empid.clone());
            }
        }
        if !conflicts.is_empty() {
            return Err(AppError::conflict(format!(
                "Records already exist in {}/{} for: {}",
                req.target_month,
                req.target_year,
                conflicts.join(", ")
            )));
        }

        let changed_by = req
            .changed_by
            .clone()
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        let mut report = ImportReport {
            imported: 0,
            failures: Vec::new(),
        };

        for source in &sources {
            match self.import_one(source, &req, &changed_by).await {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    warn!(empid = %source.empid, error = %e, "Import failed for employee");
                    report.failures.push(ImportFailure {
                        empid: source.empid.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            site_id = %req.site_id,
            imported = report.imported,
            failed = report.failures.len(),
            "Import between months finished"
        );
        Ok(report)
    }

    async fn import_one(
        &self,
        source: &EmployeeMonthRecord,
        req: &ImportRequest,
        changed_by: &str,
    ) -> AppResult<()> {
        let lock = self.lock_for(&source.empid);
        let _guard = lock.lock().await;

        let carry = if req.preserve_carry_forward {
            CarryForward {
                value: source.closing_balance,
                remark: Some(format!(
                    "Carried forward from {}/{}",
                    source.month, source.year
                )),
                date: Some(time::today_string()),
            }
        } else {
            CarryForward::default()
        };

        let now = time::now_millis();
        let mut record = EmployeeMonthRecord {
            id: 0,
            site_id: source.site_id.clone(),
            empid: source.empid.clone(),
            name: source.name.clone(),
            month: req.target_month,
            year: req.target_year,
            rate: source.rate,
            attendance: Vec::new(),
            payouts: Vec::new(),
            additional_req_pays: if req.preserve_additional_pays {
                source.additional_req_pays.clone()
            } else {
                Vec::new()
            },
            carry_forwarded: carry,
            closing_balance: 0.0,
            recalculation_needed: false,
            created_by: changed_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        let totals = payroll::calculate(&record, self.policy);
        record.closing_balance = totals.closing_balance;

        let record = repo::insert(&self.pool, &record).await?;

        let change = lifecycle_change(
            ChangeType::Added,
            format!(
                "Imported {} from {}/{} into {}/{}",
                record.empid, req.source_month, req.source_year, req.target_month, req.target_year
            ),
            &record,
        );
        let ctx = ChangeContext {
            site_id: record.site_id.clone(),
            empid: record.empid.clone(),
            month: record.month,
            year: record.year,
            changed_by: changed_by.to_string(),
            remark: None,
        };
        if let Err(e) = self.ledger.record(&[change], &ctx).await {
            warn!(empid = %record.empid, error = %e, "Ledger write failed for imported record");
        }

        // A backfill into a past month leaves any existing later months
        // holding a carry that no longer matches.
        recalc::mark_later_months_dirty(
            &self.pool,
            &record.site_id,
            &record.empid,
            record.month,
            record.year,
        )
        .await?;
        Ok(())
    }

    /// Sweep flagged months, either for the given employees or for every
    /// dirty employee of the site
    ///
    /// One employee's failure is collected and the batch continues.
    pub async fn recalculate(
        &self,
        site_id: &str,
        employee_ids: Option<Vec<String>>,
    ) -> AppResult<BatchSweepReport> {
        let ids = match employee_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => repo::find_dirty_employee_ids(&self.pool, site_id).await?,
        };

        let mut report = BatchSweepReport::default();
        for empid in ids {
            let lock = self.lock_for(&empid);
            let _guard = lock.lock().await;

            match recalc::sweep_employee(&self.pool, site_id, &empid, self.policy).await {
                Ok(sweep) => {
                    report.processed += 1;
                    report.months_recalculated += sweep.months_recalculated;
                }
                Err(e) => {
                    warn!(empid = %empid, error = %e, "Recalculation sweep failed");
                    report.failures.push(SweepFailure {
                        empid: empid.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            site_id = %site_id,
            processed = report.processed,
            months = report.months_recalculated,
            failed = report.failures.len(),
            "Batch recalculation finished"
        );
        Ok(report)
    }
}

/// Full-record ledger entry for create/delete, so the audit trail can
/// reconstruct what existed without the row itself
fn lifecycle_change(
    change_type: ChangeType,
    description: String,
    record: &EmployeeMonthRecord,
) -> AtomicChange {
    AtomicChange {
        field: ChangeField::Record,
        change_type,
        description,
        data: serde_json::json!({ "record": record }),
    }
}

fn record_not_found(empid: &str, month: u32, year: i32) -> AppError {
    AppError::not_found(format!("No record found for {empid} in {month}/{year}"))
}

fn validate_month_year(month: u32, year: i32) -> AppResult<()> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    if year < MIN_YEAR {
        return Err(AppError::validation(format!(
            "year must be {MIN_YEAR} or later, got {year}"
        )));
    }
    Ok(())
}

fn validate_pay_items(items: &[PayItem], label: &str) -> AppResult<()> {
    for item in items {
        if !item.value.is_finite() {
            return Err(AppError::validation(format!(
                "{label} contains a non-finite value"
            )));
        }
    }
    Ok(())
}

fn validate_patch(patch: &EmployeeMonthPatch, month: u32, year: i32) -> AppResult<()> {
    if let Some(name) = &patch.name
        && name.trim().is_empty()
    {
        return Err(AppError::validation("name cannot be empty"));
    }
    if let Some(rate) = patch.rate
        && (!rate.is_finite() || rate < 0.0)
    {
        return Err(AppError::validation(format!(
            "rate must be a non-negative number, got {rate}"
        )));
    }
    if let Some(attendance) = &patch.attendance {
        let max_days = time::days_in_month(year, month) as usize;
        if attendance.len() > max_days {
            return Err(AppError::validation(format!(
                "attendance has {} entries but {month}/{year} has {max_days} days",
                attendance.len()
            )));
        }
    }
    if let Some(payouts) = &patch.payouts {
        validate_pay_items(payouts, "payouts")?;
    }
    if let Some(pays) = &patch.additional_req_pays {
        validate_pay_items(pays, "additional_req_pays")?;
    }
    if let Some(carry) = &patch.carry_forwarded
        && let Some(value) = carry.value
        && !value.is_finite()
    {
        return Err(AppError::validation(
            "carry_forwarded.value must be a finite number",
        ));
    }
    Ok(())
}

/// Tracked list fields replace wholesale; the carry-forward object merges
/// per sub-field
fn apply_patch(record: &mut EmployeeMonthRecord, patch: EmployeeMonthPatch) {
    if let Some(name) = patch.name {
        record.name = name.trim().to_string();
    }
    if let Some(rate) = patch.rate {
        record.rate = rate;
    }
    if let Some(attendance) = patch.attendance {
        record.attendance = attendance;
    }
    if let Some(payouts) = patch.payouts {
        record.payouts = payouts;
    }
    if let Some(pays) = patch.additional_req_pays {
        record.additional_req_pays = pays;
    }
    if let Some(carry) = patch.carry_forwarded {
        if let Some(value) = carry.value {
            record.carry_forwarded.value = value;
        }
        if let Some(remark) = carry.remark {
            record.carry_forwarded.remark = Some(remark);
        }
        if let Some(date) = carry.date {
            record.carry_forwarded.date = Some(date);
        }
    }
}

#[cfg(test)]
mod tests;
