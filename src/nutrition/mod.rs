//! Nutrient aggregation: from resolved codes to enriched ingredient records.
//!
//! # Module Organization
//!
//! - [`database`]: Reference databases and existing ingredient records (`ReferenceData`)
//! - [`bounds`]: Per-record bound derivation and multi-record merge (`NutrientBounds`)
//! - [`aggregator`]: Per-node aggregation and output records (`NutrientAggregator`, `IngredientRecord`)

mod aggregator;
mod bounds;
mod database;

pub use aggregator::{
    merge_records, ImpactSource, IngredientRecord, NutrientAggregator, NutritionSource,
    IMPACT_DATABASE, PROXY_DATABASE,
};
pub use bounds::{derive_primary, derive_secondary, merge_bounds, NutrientBounds};
pub use database::{
    ExistingIngredients, ImpactDatabase, ImpactRecord, PrimaryDatabase, PrimaryNutrient,
    PrimaryRecord, ReferenceData, SecondaryDatabase, SecondaryNutrient, SecondaryRecord,
};
