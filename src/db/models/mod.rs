//! Data models

pub mod employee_month;

pub use employee_month::*;
