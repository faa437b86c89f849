//! Employee payroll management
//!
//! - **manager**: the [`EmployeeManager`] façade every collaborator calls
//!
//! Mutations flow through the manager so that change tracking, totals
//! recalculation and forward dirty-flagging stay consistent with the
//! stored records.

pub mod manager;

pub use manager::{
    EmployeeManager, ImportFailure, ImportReport, ImportRequest, UpdateOutcome,
};
