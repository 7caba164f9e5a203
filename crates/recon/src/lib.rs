//! `qtyaudit-recon`: bill-of-quantities reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded rows, returns discrepancy records.
//! No CLI or IO dependencies.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod heuristics;
pub mod model;
pub mod policy;
pub mod rules;

pub use config::AuditConfig;
pub use engine::{run, Auditor};
pub use error::AuditError;
pub use model::{
    AuditInput, AuditReport, AuditSummary, CheckKind, ColumnLayout, DiscrepancyRecord, LineItem, RowCategory,
    Severity,
};
