//! Turns resolved nodes into enriched ingredient records.
//!
//! A node is aggregated from the first of these that applies:
//!
//! 1. its primary codes, looked up in the primary database after stale-code substitution;
//! 2. its secondary codes, looked up in the secondary database;
//! 3. the raw nutrients of the ingredient named by its `nutrition_ref`.
//!
//! Environmental-impact sources come from the impact entries of its primary codes and from its
//! `impact_ref`, independently of where its nutrients came from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    config::NutritionConfig,
    diagnostic::{Diagnostic, Diagnostics},
    error::TaxomapError,
    nutrition::{
        bounds::{derive_primary, derive_secondary, merge_bounds, NutrientBounds},
        database::{ExistingIngredients, PrimaryNutrient, ReferenceData},
    },
    properties::{substitute_code, CodeSource, Origin},
    taxonomy::{IngredientGraph, IngredientNode},
};

pub const IMPACT_DATABASE: &str = "agribalyse";
pub const PROXY_DATABASE: &str = "proxy";

/// Where a record's nutrients came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionSource {
    pub database: String,
    pub entry: String,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSource {
    pub database: String,
    pub entry: String,
}

/// Enriched ingredient record.
///
/// `extra` carries any other field: fields of an existing record it was merged into and the raw
/// `impacts` borrowed through a proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nutriments: BTreeMap<String, NutrientBounds>,
    #[serde(default)]
    pub nutritional_data_sources: Vec<NutritionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_impact_data_sources: Option<Vec<ImpactSource>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IngredientRecord {
    pub fn new(id: impl Into<String>) -> Self {
        IngredientRecord {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn has_data(&self) -> bool {
        !self.nutriments.is_empty() || self.environmental_impact_data_sources.is_some()
    }

    fn add_impact(&mut self, source: ImpactSource) {
        self.environmental_impact_data_sources
            .get_or_insert_with(Vec::new)
            .push(source);
    }
}

pub struct NutrientAggregator<'a> {
    data: &'a ReferenceData,
    config: &'a NutritionConfig,
}

impl<'a> NutrientAggregator<'a> {
    pub fn new(data: &'a ReferenceData, config: &'a NutritionConfig) -> Self {
        NutrientAggregator { data, config }
    }

    /// Record for `node`, or `None` when it yields neither nutrients nor impact sources.
    pub fn aggregate(
        &self,
        node: &IngredientNode,
        diagnostics: &mut Diagnostics,
    ) -> Option<IngredientRecord> {
        let mut record = IngredientRecord::new(node.id.as_str());

        if !node.codes.primary.is_empty() {
            self.aggregate_primary(node, &mut record, diagnostics);
        } else if !node.codes.secondary.is_empty() {
            self.aggregate_secondary(node, &mut record, diagnostics);
        } else if let Some(reference) = node.nutrition_ref.as_deref() {
            self.aggregate_raw(node, reference, &mut record, diagnostics);
        }

        if let Some(reference) = node.impact_ref.as_deref() {
            self.borrow_impacts(reference, &mut record);
        }

        record.has_data().then_some(record)
    }

    /// Records for every node of `graph` that yields data.
    pub fn aggregate_graph(
        &self,
        graph: &IngredientGraph,
    ) -> (BTreeMap<String, IngredientRecord>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let records = graph
            .nodes()
            .filter_map(|node| {
                self.aggregate(node, &mut diagnostics)
                    .map(|record| (node.id.clone(), record))
            })
            .collect::<BTreeMap<_, _>>();
        tracing::info!(
            "[Aggregator] {} of {} nodes carry nutrient or impact data",
            records.len(),
            graph.len()
        );
        (records, diagnostics)
    }

    fn aggregate_primary(
        &self,
        node: &IngredientNode,
        record: &mut IngredientRecord,
        diagnostics: &mut Diagnostics,
    ) {
        let mut contributions: BTreeMap<&str, Vec<NutrientBounds>> = BTreeMap::new();
        for raw_code in node.codes(CodeSource::Primary) {
            let code = substitute_code(raw_code);
            let Some(entry) = self.data.primary.get(code) else {
                diagnostics.push(Diagnostic::MissingRecord {
                    database: CodeSource::Primary.database_name().to_string(),
                    code: code.to_string(),
                });
                continue;
            };
            record.nutritional_data_sources.push(NutritionSource {
                database: CodeSource::Primary.database_name().to_string(),
                entry: entry.name.clone(),
                origin: node.origin,
            });
            for (field, nutrient) in entry.nutriments.iter() {
                if let Some(bounds) = derive_primary(field, nutrient, self.config) {
                    contributions.entry(field.as_str()).or_default().push(bounds);
                }
            }
            if let Some(impact) = self.data.impacts.get(code) {
                record.add_impact(ImpactSource {
                    database: IMPACT_DATABASE.to_string(),
                    entry: impact.name.clone().unwrap_or_else(|| code.to_string()),
                });
            }
        }
        self.merge_into(record, contributions);
    }

    fn aggregate_secondary(
        &self,
        node: &IngredientNode,
        record: &mut IngredientRecord,
        diagnostics: &mut Diagnostics,
    ) {
        let mut contributions: BTreeMap<&str, Vec<NutrientBounds>> = BTreeMap::new();
        for code in node.codes(CodeSource::Secondary) {
            let Some(entry) = self.data.secondary.get(code) else {
                diagnostics.push(Diagnostic::MissingRecord {
                    database: CodeSource::Secondary.database_name().to_string(),
                    code: code.clone(),
                });
                continue;
            };
            record.nutritional_data_sources.push(NutritionSource {
                database: CodeSource::Secondary.database_name().to_string(),
                entry: entry.name.clone(),
                origin: node.origin,
            });
            for (field, nutrient) in entry.nutriments.iter() {
                if let Some(bounds) = derive_secondary(field, nutrient, self.config) {
                    contributions.entry(field.as_str()).or_default().push(bounds);
                }
            }
        }
        self.merge_into(record, contributions);
    }

    fn aggregate_raw(
        &self,
        node: &IngredientNode,
        reference: &str,
        record: &mut IngredientRecord,
        diagnostics: &mut Diagnostics,
    ) {
        match raw_nutriments(&self.data.existing, reference) {
            Ok(Some(nutriments)) => {
                record.nutritional_data_sources.push(NutritionSource {
                    database: PROXY_DATABASE.to_string(),
                    entry: self.data.existing.record_id(reference).to_string(),
                    origin: node.origin,
                });
                for (field, nutrient) in nutriments.iter() {
                    if let Some(bounds) = derive_primary(field, nutrient, self.config) {
                        record.nutriments.insert(field.clone(), bounds);
                    }
                }
            }
            Ok(None) => diagnostics.push(Diagnostic::UnresolvedProxy {
                id: node.id.clone(),
                reference: reference.to_string(),
            }),
            Err(err) => diagnostics.push(Diagnostic::Warning(format!(
                "raw nutrients of '{reference}' borrowed by '{}' are unreadable: {err}",
                node.id
            ))),
        }
    }

    fn borrow_impacts(&self, reference: &str, record: &mut IngredientRecord) {
        record.add_impact(ImpactSource {
            database: PROXY_DATABASE.to_string(),
            entry: self.data.existing.record_id(reference).to_string(),
        });
        if let Some(impacts) = self
            .data
            .existing
            .get(reference)
            .and_then(|r| r.get(ExistingIngredients::IMPACTS))
        {
            record
                .extra
                .insert(ExistingIngredients::IMPACTS.to_string(), impacts.clone());
        }
    }

    fn merge_into(
        &self,
        record: &mut IngredientRecord,
        contributions: BTreeMap<&str, Vec<NutrientBounds>>,
    ) {
        for (field, bounds) in contributions {
            if let Some(merged) = merge_bounds(field, &bounds, self.config) {
                record.nutriments.insert(field.to_string(), merged);
            }
        }
    }
}

fn raw_nutriments(
    existing: &ExistingIngredients,
    reference: &str,
) -> Result<Option<BTreeMap<String, PrimaryNutrient>>, TaxomapError> {
    match existing
        .get(reference)
        .and_then(|r| r.get(ExistingIngredients::NUTRIMENTS))
    {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => Ok(Some(serde_json::from_value(raw.clone())?)),
    }
}

/// Merge `records` into `existing`: fields of a record overwrite those of the existing entry
/// with the same id, other existing fields are kept. An existing impact-source list is dropped
/// when the new record has none.
pub fn merge_records(
    mut existing: ExistingIngredients,
    records: &BTreeMap<String, IngredientRecord>,
) -> Result<ExistingIngredients, TaxomapError> {
    for (id, record) in records.iter() {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            return Err(TaxomapError::Serialization(format!(
                "record '{id}' did not serialize to an object"
            )));
        };
        let target = existing.entry_or_new(id);
        if record.environmental_impact_data_sources.is_none() {
            target.remove("environmental_impact_data_sources");
        }
        for (key, value) in fields {
            if key == "id" && target.contains_key("id") {
                continue;
            }
            target.insert(key, value);
        }
    }
    Ok(existing)
}
