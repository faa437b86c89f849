//! Rollbook - construction-site payroll and attendance backend
//!
//! # Module structure
//!
//! ```text
//! src/
//! ├── core/        # configuration, server state, HTTP server
//! ├── api/         # route modules and handlers
//! ├── db/          # pool init, schema, models, repository
//! ├── attendance/  # day-code codec
//! ├── payroll/     # totals calculator
//! ├── tracking/    # change diff engine + append-only ledger
//! ├── recalc/      # forward recalculation cascade
//! ├── employees/   # manager façade for all record mutations
//! └── utils/       # errors, logging, time helpers
//! ```
//!
//! Attendance is stored as compact day-codes (`"P"`, `"P8"`, `"A3"`).
//! Every mutation flows through [`employees::EmployeeManager`], which
//! recomputes monthly totals, writes one ledger entry per atomic change
//! and flags later months whose carried balance went stale. Flagged
//! months are repaired oldest-first by the recalculation sweep.

pub mod api;
pub mod attendance;
pub mod core;
pub mod db;
pub mod employees;
pub mod payroll;
pub mod recalc;
pub mod tracking;
pub mod utils;

pub use crate::core::{Config, Server, ServerState};
pub use employees::EmployeeManager;
pub use tracking::ChangeLedger;
pub use utils::logger::{init_logger, init_logger_with_file};
pub use utils::{AppError, AppResponse, AppResult};

/// Prepare the process environment: dotenv, data directory, logging
///
/// Must run before [`Config::from_env`] so `.env` values are visible.
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into());
    std::fs::create_dir_all(&data_dir)?;

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_to_file = std::env::var("LOG_TO_FILE")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    let log_dir = format!("{data_dir}/logs");
    if log_to_file {
        std::fs::create_dir_all(&log_dir)?;
    }
    init_logger_with_file(
        log_level.as_deref(),
        log_to_file.then_some(log_dir.as_str()),
    );

    Ok(())
}
