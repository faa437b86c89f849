//! Shared server state

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::Config;
use crate::db::DbService;
use crate::employees::EmployeeManager;
use crate::tracking::ChangeLedger;
use crate::utils::AppError;

/// Handles shared by every request handler
///
/// Cloning is cheap: the pool and ledger are handle types and the
/// manager sits behind an [`Arc`].
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub employees: Arc<EmployeeManager>,
    pub ledger: ChangeLedger,
}

impl ServerState {
    /// Open the database and wire the manager and ledger to it
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new(&config.database_path()).await?;
        Ok(Self::with_pool(config.clone(), db.pool))
    }

    /// Build state on an already opened pool
    ///
    /// Used by tests running against an in-memory database.
    pub fn with_pool(config: Config, pool: SqlitePool) -> Self {
        let ledger = ChangeLedger::new(pool.clone());
        let employees = Arc::new(EmployeeManager::new(
            pool.clone(),
            ledger.clone(),
            config.overtime_policy,
        ));
        Self {
            config,
            pool,
            employees,
            ledger,
        }
    }
}
