use crate::payroll::OvertimePolicy;

/// Server configuration
///
/// # Environment variables
///
/// Every field can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | DATA_DIR | ./data | directory for the database and log files |
/// | DATABASE_FILE | rollbook.db | SQLite filename inside DATA_DIR |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | OVERTIME_POLICY | standard | standard \| special |
/// | LOG_LEVEL | info | max tracing level (error..trace) |
/// | LOG_TO_FILE | false | also write daily-rolling log files |
/// | ENVIRONMENT | development | development \| staging \| production |
///
/// # Example
///
/// ```ignore
/// DATA_DIR=/var/lib/rollbook OVERTIME_POLICY=special cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database file and logs
    pub data_dir: String,
    /// SQLite filename inside `data_dir`
    pub database_file: String,
    /// HTTP API port
    pub http_port: u16,
    /// Overtime-to-days conversion used by every calculator call
    pub overtime_policy: OvertimePolicy,
    /// Max tracing level
    pub log_level: String,
    /// Write daily-rolling log files in addition to stdout
    pub log_to_file: bool,
    /// Runtime environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from the environment, with defaults for
    /// anything unset
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()),
            database_file: std::env::var("DATABASE_FILE")
                .unwrap_or_else(|_| "rollbook.db".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            overtime_policy: std::env::var("OVERTIME_POLICY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_to_file: std::env::var("LOG_TO_FILE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Override data directory and port, keeping the rest from the
    /// environment
    ///
    /// Intended for tests.
    pub fn with_overrides(data_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.data_dir = data_dir.into();
        config.http_port = http_port;
        config
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> String {
        format!("{}/{}", self.data_dir, self.database_file)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
