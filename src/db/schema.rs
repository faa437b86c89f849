//! Database schema
//!
//! Tables are created on startup with `CREATE TABLE IF NOT EXISTS`, so a
//! fresh data directory bootstraps itself and restarts are no-ops.

use sqlx::SqlitePool;

/// Create all tables and indexes
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_employee_month_table(pool).await?;
    create_change_log_table(pool).await?;
    Ok(())
}

async fn create_employee_month_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employee_month (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id TEXT NOT NULL,
            empid TEXT NOT NULL,
            name TEXT NOT NULL,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL CHECK (year >= 2000),
            rate REAL NOT NULL DEFAULT 0 CHECK (rate >= 0),
            attendance TEXT NOT NULL DEFAULT '[]',
            payouts TEXT NOT NULL DEFAULT '[]',
            additional_req_pays TEXT NOT NULL DEFAULT '[]',
            carry_forwarded TEXT NOT NULL DEFAULT '{"value":0.0}',
            closing_balance REAL NOT NULL DEFAULT 0,
            recalculation_needed INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL DEFAULT 'system',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (empid, month, year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_employee_month_site
         ON employee_month (site_id, empid, year, month)",
    )
    .execute(pool)
    .await?;

    // partial index keeps the dirty-record scan cheap
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_employee_month_dirty
         ON employee_month (site_id, empid, year, month)
         WHERE recalculation_needed = 1",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_change_log_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS change_log (
            sequence INTEGER PRIMARY KEY,
            site_id TEXT NOT NULL,
            empid TEXT NOT NULL,
            month INTEGER NOT NULL,
            year INTEGER NOT NULL,
            field TEXT NOT NULL,
            change_type TEXT NOT NULL,
            description TEXT NOT NULL,
            data TEXT NOT NULL,
            changed_by TEXT NOT NULL,
            remark TEXT,
            timestamp INTEGER NOT NULL,
            prev_hash TEXT NOT NULL,
            curr_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_change_log_empid
         ON change_log (empid, timestamp)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_change_log_timestamp
         ON change_log (timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
