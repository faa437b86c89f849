//! Shared utilities
//!
//! - [`error`] - unified API error type and response envelope
//! - [`logger`] - tracing setup
//! - [`time`] - timestamp and calendar helpers

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, AppResult};
