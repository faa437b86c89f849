//! Employee API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::db::models::{EmployeeCreate, EmployeeMonthPatch, EmployeeMonthRecord};
use crate::employees::{ImportReport, ImportRequest, UpdateOutcome};
use crate::payroll::PayrollTotals;
use crate::recalc::BatchSweepReport;
use crate::utils::AppResult;

fn actor(changed_by: Option<String>) -> String {
    changed_by.unwrap_or_else(|| "system".to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub site_id: String,
    pub month: u32,
    pub year: i32,
}

/// Partial update plus audit metadata, in one body
#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    #[serde(flatten)]
    pub patch: EmployeeMonthPatch,
    #[serde(default)]
    pub changed_by: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Audit metadata for deletions, passed as query parameters
#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    #[serde(default)]
    pub changed_by: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecalculateRequest {
    pub site_id: String,
    /// Sweep only these employees; `None` sweeps every flagged one
    #[serde(default)]
    pub employee_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeDetail {
    pub record: EmployeeMonthRecord,
    pub totals: PayrollTotals,
}

/// GET /api/employees - site roster for one calendar month
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<EmployeeMonthRecord>>> {
    let records = state
        .employees
        .list_employees(&query.site_id, query.month, query.year)
        .await?;
    Ok(Json(records))
}

/// POST /api/employees - create an employee with a fresh serial id
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<EmployeeCreate>,
) -> AppResult<Json<EmployeeMonthRecord>> {
    let record = state.employees.create_employee(payload).await?;
    Ok(Json(record))
}

/// GET /api/employees/{empid}/{month}/{year}
///
/// Repairs a stale record before returning it.
pub async fn get_month(
    State(state): State<ServerState>,
    Path((empid, month, year)): Path<(String, u32, i32)>,
) -> AppResult<Json<EmployeeDetail>> {
    let (record, totals) = state.employees.get_employee(&empid, month, year).await?;
    Ok(Json(EmployeeDetail { record, totals }))
}

/// PUT /api/employees/{empid}/{month}/{year}
pub async fn update_month(
    State(state): State<ServerState>,
    Path((empid, month, year)): Path<(String, u32, i32)>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> AppResult<Json<UpdateOutcome>> {
    let outcome = state
        .employees
        .update_employee(
            &empid,
            month,
            year,
            payload.patch,
            &actor(payload.changed_by),
            payload.remark,
        )
        .await?;
    Ok(Json(outcome))
}

/// DELETE /api/employees/{empid}/{month}/{year}
pub async fn delete_month(
    State(state): State<ServerState>,
    Path((empid, month, year)): Path<(String, u32, i32)>,
    Query(query): Query<ActorQuery>,
) -> AppResult<Json<bool>> {
    state
        .employees
        .delete_month(&empid, month, year, &actor(query.changed_by), query.remark)
        .await?;
    Ok(Json(true))
}

/// DELETE /api/employees/{empid} - every month of the employee
pub async fn delete_all_months(
    State(state): State<ServerState>,
    Path(empid): Path<String>,
    Query(query): Query<ActorQuery>,
) -> AppResult<Json<u64>> {
    let removed = state
        .employees
        .delete_employee(&empid, &actor(query.changed_by), query.remark)
        .await?;
    Ok(Json(removed))
}

/// POST /api/employees/import - copy a month's roster into another month
pub async fn import(
    State(state): State<ServerState>,
    Json(payload): Json<ImportRequest>,
) -> AppResult<Json<ImportReport>> {
    let report = state.employees.import_between_months(payload).await?;
    Ok(Json(report))
}

/// POST /api/employees/recalculate - batch sweep of flagged months
pub async fn recalculate(
    State(state): State<ServerState>,
    Json(payload): Json<RecalculateRequest>,
) -> AppResult<Json<BatchSweepReport>> {
    let report = state
        .employees
        .recalculate(&payload.site_id, payload.employee_ids)
        .await?;
    Ok(Json(report))
}
