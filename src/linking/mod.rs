//! Linking module: curated tables and the tiered loader that applies them.
//!
//! # Module Organization
//!
//! - [`tables`]: CSV tables (`LinkTable`, `ProxyTable`, `ManualEntryTable`, `LinkTables`)
//! - [`loader`]: Priority-ordered application of every tier (`TieredLoader`)
//! - [`audit`]: Link table review against embedded codes (`audit_links`)

mod audit;
mod loader;
mod tables;

pub use audit::{audit_links, AuditEntry, AuditStatus};
pub use loader::{LoadReport, Tier, TierOutcome, TieredLoader};
pub use tables::{
    code_column, LinkTable, LinkTables, ManualEntryRow, ManualEntryTable, ManualValue, ProxyRow,
    ProxyTable, ID_COLUMN,
};
