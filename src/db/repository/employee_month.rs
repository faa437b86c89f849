//! Employee Month Repository

use super::{RepoError, RepoResult};
use crate::db::models::EmployeeMonthRecord;
use crate::utils::time;
use sqlx::SqlitePool;

/// Raw row with JSON text columns still unparsed
#[derive(Debug, sqlx::FromRow)]
struct EmployeeMonthRow {
    id: i64,
    site_id: String,
    empid: String,
    name: String,
    month: u32,
    year: i32,
    rate: f64,
    attendance: String,
    payouts: String,
    additional_req_pays: String,
    carry_forwarded: String,
    closing_balance: f64,
    recalculation_needed: bool,
    created_by: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<EmployeeMonthRow> for EmployeeMonthRecord {
    type Error = RepoError;

    fn try_from(row: EmployeeMonthRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            site_id: row.site_id,
            empid: row.empid,
            name: row.name,
            month: row.month,
            year: row.year,
            rate: row.rate,
            attendance: serde_json::from_str(&row.attendance)?,
            payouts: serde_json::from_str(&row.payouts)?,
            additional_req_pays: serde_json::from_str(&row.additional_req_pays)?,
            carry_forwarded: serde_json::from_str(&row.carry_forwarded)?,
            closing_balance: row.closing_balance,
            recalculation_needed: row.recalculation_needed,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<EmployeeMonthRow>) -> RepoResult<Vec<EmployeeMonthRecord>> {
    rows.into_iter().map(EmployeeMonthRecord::try_from).collect()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<EmployeeMonthRecord>> {
    let row = sqlx::query_as::<_, EmployeeMonthRow>(
        "SELECT id, site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at FROM employee_month WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(EmployeeMonthRecord::try_from).transpose()
}

pub async fn find(
    pool: &SqlitePool,
    empid: &str,
    month: u32,
    year: i32,
) -> RepoResult<Option<EmployeeMonthRecord>> {
    let row = sqlx::query_as::<_, EmployeeMonthRow>(
        "SELECT id, site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at FROM employee_month WHERE empid = ? AND month = ? AND year = ?",
    )
    .bind(empid)
    .bind(month)
    .bind(year)
    .fetch_optional(pool)
    .await?;
    row.map(EmployeeMonthRecord::try_from).transpose()
}

/// All month records of one employee, oldest first
pub async fn find_all_months(
    pool: &SqlitePool,
    empid: &str,
) -> RepoResult<Vec<EmployeeMonthRecord>> {
    let rows = sqlx::query_as::<_, EmployeeMonthRow>(
        "SELECT id, site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at FROM employee_month WHERE empid = ? ORDER BY year ASC, month ASC",
    )
    .bind(empid)
    .fetch_all(pool)
    .await?;
    into_records(rows)
}

/// All records of a site for one calendar month
pub async fn find_by_site_month(
    pool: &SqlitePool,
    site_id: &str,
    month: u32,
    year: i32,
) -> RepoResult<Vec<EmployeeMonthRecord>> {
    let rows = sqlx::query_as::<_, EmployeeMonthRow>(
        "SELECT id, site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at FROM employee_month WHERE site_id = ? AND month = ? AND year = ? ORDER BY empid ASC",
    )
    .bind(site_id)
    .bind(month)
    .bind(year)
    .fetch_all(pool)
    .await?;
    into_records(rows)
}

/// Insert a record whose empid is already assigned
pub async fn insert(
    pool: &SqlitePool,
    record: &EmployeeMonthRecord,
) -> RepoResult<EmployeeMonthRecord> {
    let result = sqlx::query_scalar::<_, i64>(
        "INSERT INTO employee_month (site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&record.site_id)
    .bind(&record.empid)
    .bind(&record.name)
    .bind(record.month)
    .bind(record.year)
    .bind(record.rate)
    .bind(serde_json::to_string(&record.attendance)?)
    .bind(serde_json::to_string(&record.payouts)?)
    .bind(serde_json::to_string(&record.additional_req_pays)?)
    .bind(serde_json::to_string(&record.carry_forwarded)?)
    .bind(record.closing_balance)
    .bind(record.recalculation_needed)
    .bind(&record.created_by)
    .bind(record.created_at)
    .bind(record.updated_at)
    .fetch_one(pool)
    .await;

    let id = match result {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(RepoError::Duplicate(format!(
                "Record already exists for {} in {}/{}",
                record.empid, record.month, record.year
            )));
        }
        Err(e) => return Err(e.into()),
    };

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database(sqlx::Error::RowNotFound))
}

/// Insert a record, assigning the next `EMP###` serial empid inside a
/// transaction
///
/// The serial is one past the highest numeric suffix currently in the
/// table, so it survives restarts without a counter row.
pub async fn insert_with_serial(
    pool: &SqlitePool,
    record: &EmployeeMonthRecord,
) -> RepoResult<EmployeeMonthRecord> {
    let mut tx = pool.begin().await?;

    let max_serial = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(CAST(SUBSTR(empid, 4) AS INTEGER)), 0) FROM employee_month WHERE empid LIKE 'EMP%'",
    )
    .fetch_one(&mut *tx)
    .await?;
    let empid = format!("EMP{:03}", max_serial + 1);

    let result = sqlx::query_scalar::<_, i64>(
        "INSERT INTO employee_month (site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&record.site_id)
    .bind(&empid)
    .bind(&record.name)
    .bind(record.month)
    .bind(record.year)
    .bind(record.rate)
    .bind(serde_json::to_string(&record.attendance)?)
    .bind(serde_json::to_string(&record.payouts)?)
    .bind(serde_json::to_string(&record.additional_req_pays)?)
    .bind(serde_json::to_string(&record.carry_forwarded)?)
    .bind(record.closing_balance)
    .bind(record.recalculation_needed)
    .bind(&record.created_by)
    .bind(record.created_at)
    .bind(record.updated_at)
    .fetch_one(&mut *tx)
    .await;

    let id = match result {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(RepoError::Duplicate(format!(
                "Record already exists for {} in {}/{}",
                empid, record.month, record.year
            )));
        }
        Err(e) => return Err(e.into()),
    };

    tx.commit().await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database(sqlx::Error::RowNotFound))
}

/// Persist the editable and derived fields of an existing record
pub async fn update(
    pool: &SqlitePool,
    record: &EmployeeMonthRecord,
) -> RepoResult<EmployeeMonthRecord> {
    let now = time::now_millis();

    let rows = sqlx::query(
        "UPDATE employee_month SET name = ?, rate = ?, attendance = ?, payouts = ?, additional_req_pays = ?, carry_forwarded = ?, closing_balance = ?, recalculation_needed = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&record.name)
    .bind(record.rate)
    .bind(serde_json::to_string(&record.attendance)?)
    .bind(serde_json::to_string(&record.payouts)?)
    .bind(serde_json::to_string(&record.additional_req_pays)?)
    .bind(serde_json::to_string(&record.carry_forwarded)?)
    .bind(record.closing_balance)
    .bind(record.recalculation_needed)
    .bind(now)
    .bind(record.id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Record {} for {}/{} no longer exists",
            record.empid, record.month, record.year
        )));
    }
    find_by_id(pool, record.id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Record {} not found", record.empid)))
}

/// Delete one month record; true when a row was removed
pub async fn delete(pool: &SqlitePool, empid: &str, month: u32, year: i32) -> RepoResult<bool> {
    let rows = sqlx::query("DELETE FROM employee_month WHERE empid = ? AND month = ? AND year = ?")
        .bind(empid)
        .bind(month)
        .bind(year)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected() > 0)
}

/// Delete every month record of an employee; returns removed row count
pub async fn delete_all_months(pool: &SqlitePool, empid: &str) -> RepoResult<u64> {
    let rows = sqlx::query("DELETE FROM employee_month WHERE empid = ?")
        .bind(empid)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected())
}

/// Flag every month of the employee strictly after (month, year)
///
/// Returns the number of flagged rows.
pub async fn mark_later_months_dirty(
    pool: &SqlitePool,
    site_id: &str,
    empid: &str,
    month: u32,
    year: i32,
) -> RepoResult<u64> {
    let now = time::now_millis();
    let rows = sqlx::query(
        "UPDATE employee_month SET recalculation_needed = 1, updated_at = ?1 WHERE site_id = ?2 AND empid = ?3 AND (year > ?4 OR (year = ?4 AND month > ?5))",
    )
    .bind(now)
    .bind(site_id)
    .bind(empid)
    .bind(year)
    .bind(month)
    .execute(pool)
    .await?;
    Ok(rows.rows_affected())
}

/// Oldest flagged month of one employee, if any
pub async fn find_oldest_dirty(
    pool: &SqlitePool,
    site_id: &str,
    empid: &str,
) -> RepoResult<Option<EmployeeMonthRecord>> {
    let row = sqlx::query_as::<_, EmployeeMonthRow>(
        "SELECT id, site_id, empid, name, month, year, rate, attendance, payouts, additional_req_pays, carry_forwarded, closing_balance, recalculation_needed, created_by, created_at, updated_at FROM employee_month WHERE site_id = ? AND empid = ? AND recalculation_needed = 1 ORDER BY year ASC, month ASC LIMIT 1",
    )
    .bind(site_id)
    .bind(empid)
    .fetch_optional(pool)
    .await?;
    row.map(EmployeeMonthRecord::try_from).transpose()
}

/// Distinct employees of a site with at least one flagged month
pub async fn find_dirty_employee_ids(pool: &SqlitePool, site_id: &str) -> RepoResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT empid FROM employee_month WHERE site_id = ? AND recalculation_needed = 1 ORDER BY empid ASC",
    )
    .bind(site_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Closing balance of one month record, `None` when the month is absent
pub async fn find_closing_balance(
    pool: &SqlitePool,
    empid: &str,
    month: u32,
    year: i32,
) -> RepoResult<Option<f64>> {
    let balance = sqlx::query_scalar::<_, f64>(
        "SELECT closing_balance FROM employee_month WHERE empid = ? AND month = ? AND year = ?",
    )
    .bind(empid)
    .bind(month)
    .bind(year)
    .fetch_optional(pool)
    .await?;
    Ok(balance)
}
