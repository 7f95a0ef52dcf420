//! # taxomap-core
//!
//! A Rust library that resolves nutrition and environmental-impact reference codes across an
//! ingredient taxonomy, and merges the matched database records into one nutrient range per
//! ingredient.
//!
//! ## Overview
//!
//! An ingredient taxonomy has tens of thousands of nodes organized by parent/child relations,
//! while the external nutrition and impact databases only describe a few thousand foods.
//! taxomap-core decides, for every node, which external codes apply:
//!
//! - **Graph construction**: the taxonomy becomes a node map with symmetric parent/child sets,
//!   repairing one-sided listings, creating nodes that are only referenced as children and
//!   dropping parent references to undefined ids
//! - **Tiered mapping**: embedded codes, curated link tables, proxies, a secondary database and
//!   manual entries are applied in strict priority order; a tier never overwrites a node an
//!   earlier tier resolved
//! - **Propagation**: unresolved nodes borrow the codes of the nearest resolved nodes along
//!   children, then parents, then both, until a fixed point
//! - **Aggregation**: the records behind each node's codes are merged into `{value, min, max}`
//!   per nutrient, with traceable data sources
//!
//! ## Architecture
//!
//! - **[`taxonomy`]**: Node map and Graph Builder (`IngredientGraph`, `GraphBuilder`)
//! - **[`linking`]**: Curated tables and the tiered loader (`LinkTables`, `TieredLoader`)
//! - **[`propagation`]**: Fixed-point propagation (`PropagationEngine`, `collect_codes`)
//! - **[`nutrition`]**: Reference databases and aggregation (`ReferenceData`, `NutrientAggregator`)
//! - **[`report`]**: Mapping report and coverage summary
//! - **[`pipeline`]**: One run from configuration to enriched records (`Pipeline`)
//! - **[`properties`]**: Origins, code sources, proxy kinds and stale-code substitution
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use taxomap_core::{
//!     config::{ConfigProvider, TomlConfigProvider},
//!     pipeline::Pipeline,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TomlConfigProvider::new(PathBuf::from("taxomap.toml")).load()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!     let output = pipeline.run()?;
//!
//!     for (id, record) in output.records.iter() {
//!         println!("{id}: {} nutriments", record.nutriments.len());
//!     }
//!     for diagnostic in output.diagnostics.warnings() {
//!         println!("warning: {diagnostic}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Diagnostics
//!
//! External tables are noisier than the taxonomy. Rows naming unknown ingredients, proxies with
//! nothing to lend, codes missing from a database and propagation phases hitting their pass limit
//! are reported as [`diagnostic::Diagnostic`]s rather than errors. Only malformed input (a broken
//! taxonomy, a table missing a required column, unreadable files) aborts a run.
//!
//! ## Features
//!
//! - **default**: The library
//! - **bin**: The `taxomap` command line tool

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod linking;
pub mod nutrition;
pub mod pipeline;
pub mod propagation;
pub mod properties;
pub mod report;
pub mod taxonomy;
#[cfg(test)]
mod tests;

pub use error::*;
