//! Taxonomy module: the ingredient node map and its construction.
//!
//! # Module Organization
//!
//! - [`graph`]: Node map with symmetric parent/child sets (`IngredientGraph`, `IngredientNode`)
//! - [`builder`]: Taxonomy parsing and graph construction (`TaxonomySource`, `GraphBuilder`)

mod builder;
mod graph;

pub use builder::{GraphBuilder, TaxonomyEntry, TaxonomySource, EMBEDDED_CODE_FIELD};
pub use graph::{IngredientGraph, IngredientNode, ManualEntry, Relation};
