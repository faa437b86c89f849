use super::*;
use crate::db::DbService;
use crate::db::models::CarryForwardPatch;
use crate::tracking::types::{ChangeLogEntry, ChangeLogQuery};

async fn create_test_manager() -> EmployeeManager {
    let db = DbService::open_in_memory().await.unwrap();
    let ledger = ChangeLedger::new(db.pool.clone());
    EmployeeManager::new(db.pool, ledger, OvertimePolicy::Standard)
}

/// Manager whose ledger points at a closed pool, so data writes succeed
/// while ledger writes fail
async fn create_manager_with_broken_ledger() -> EmployeeManager {
    let db = DbService::open_in_memory().await.unwrap();
    let dead = DbService::open_in_memory().await.unwrap();
    dead.pool.close().await;
    let ledger = ChangeLedger::new(dead.pool);
    EmployeeManager::new(db.pool, ledger, OvertimePolicy::Standard)
}

/// Insert a month record directly, with totals derived from the inputs
async fn seed_month(
    manager: &EmployeeManager,
    empid: &str,
    month: u32,
    year: i32,
    rate: f64,
    attendance: Vec<&str>,
) -> EmployeeMonthRecord {
    let now = time::now_millis();
    let mut record = EmployeeMonthRecord {
        id: 0,
        site_id: "SITE1".to_string(),
        empid: empid.to_string(),
        name: format!("Worker {empid}"),
        month,
        year,
        rate,
        attendance: attendance.into_iter().map(String::from).collect(),
        payouts: Vec::new(),
        additional_req_pays: Vec::new(),
        carry_forwarded: CarryForward::default(),
        closing_balance: 0.0,
        recalculation_needed: false,
        created_by: "seed".to_string(),
        created_at: now,
        updated_at: now,
    };
    let totals = payroll::calculate(&record, OvertimePolicy::Standard);
    record.closing_balance = totals.closing_balance;
    repo::insert(&manager.pool, &record).await.unwrap()
}

async fn find_record(
    manager: &EmployeeManager,
    empid: &str,
    month: u32,
    year: i32,
) -> EmployeeMonthRecord {
    repo::find(&manager.pool, empid, month, year)
        .await
        .unwrap()
        .unwrap()
}

async fn ledger_entries_for(manager: &EmployeeManager, empid: &str) -> Vec<ChangeLogEntry> {
    let query = ChangeLogQuery {
        empid: Some(empid.to_string()),
        limit: 100,
        ..Default::default()
    };
    manager.ledger.query(&query).await.unwrap().items
}

fn pay_item(value: f64, date: &str, remark: &str) -> PayItem {
    PayItem {
        value,
        date: Some(date.to_string()),
        remark: Some(remark.to_string()),
        created_by: Some("admin".to_string()),
    }
}

fn attendance_patch(codes: Vec<&str>) -> EmployeeMonthPatch {
    EmployeeMonthPatch {
        attendance: Some(codes.into_iter().map(String::from).collect()),
        ..Default::default()
    }
}

fn rate_patch(rate: f64) -> EmployeeMonthPatch {
    EmployeeMonthPatch {
        rate: Some(rate),
        ..Default::default()
    }
}

fn next_month(month: u32, year: i32) -> (u32, i32) {
    if month == 12 { (1, year + 1) } else { (month + 1, year) }
}

mod test_lifecycle;
