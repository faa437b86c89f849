//! Core module - configuration, state and server lifecycle
//!
//! - [`Config`] - environment-driven configuration
//! - [`ServerState`] - shared handles for request handlers
//! - [`Server`] - HTTP server startup and shutdown

pub mod config;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::Server;
pub use state::ServerState;
