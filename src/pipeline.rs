//! The pipeline driver: one linking run from configuration to enriched records.
//!
//! All inputs are loaded up front into [`PipelineInputs`], an immutable bundle scoped to the run.
//! [`Pipeline::run`] then owns the node map exclusively while it builds the graph, applies the
//! tiers and aggregates nutrients; the finished map is handed back read-only in
//! [`PipelineOutput`].

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use crate::{
    config::{get_content, PipelineConfig},
    diagnostic::Diagnostics,
    error::TaxomapError,
    linking::{
        audit_links, AuditEntry, LinkTable, LinkTables, ManualEntryTable, ProxyTable, TieredLoader,
    },
    nutrition::{
        merge_records, ExistingIngredients, ImpactDatabase, IngredientRecord, NutrientAggregator,
        PrimaryDatabase, ReferenceData, SecondaryDatabase,
    },
    propagation::PropagationReport,
    properties::CodeSource,
    report::{CoverageSummary, MappingReport},
    taxonomy::{GraphBuilder, IngredientGraph, TaxonomySource},
};

/// Everything a run reads, loaded once.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub taxonomy: TaxonomySource,
    pub tables: LinkTables,
    pub data: ReferenceData,
}

fn load_optional<T: Default>(
    path: Option<&Path>,
    load: impl FnOnce(&Path) -> Result<T, TaxomapError>,
) -> Result<T, TaxomapError> {
    match path {
        Some(path) => load(path),
        None => Ok(T::default()),
    }
}

impl PipelineInputs {
    pub fn load(config: &PipelineConfig) -> Result<Self, TaxomapError> {
        let inputs = &config.inputs;
        let taxonomy = TaxonomySource::from_json_str(
            &get_content(&inputs.taxonomy)?,
            config.taxonomy.require_relation_fields,
        )?;
        tracing::info!("Loaded {} taxonomy entries", taxonomy.len());

        let tables = LinkTables {
            primary: LinkTable::from_path(CodeSource::Primary, &inputs.primary_links)?,
            secondary: match inputs.secondary_links.as_deref() {
                Some(path) => LinkTable::from_path(CodeSource::Secondary, path)?,
                None => LinkTable::new(CodeSource::Secondary),
            },
            proxies: load_optional(inputs.proxies.as_deref(), |p| ProxyTable::from_path(p))?,
            manual_entries: load_optional(inputs.manual_entries.as_deref(), |p| {
                ManualEntryTable::from_path(p)
            })?,
        };

        let data = ReferenceData {
            primary: PrimaryDatabase::from_path(&inputs.primary_database)?,
            secondary: load_optional(inputs.secondary_database.as_deref(), |p| {
                SecondaryDatabase::from_path(p)
            })?,
            impacts: load_optional(inputs.impact_database.as_deref(), |p| {
                ImpactDatabase::from_path(p)
            })?,
            existing: match inputs.existing_ingredients.as_deref() {
                Some(path) if path.exists() => ExistingIngredients::from_path(path)?,
                Some(path) => {
                    tracing::info!(
                        "No existing ingredient records at {}, starting empty",
                        path.display()
                    );
                    ExistingIngredients::default()
                }
                None => ExistingIngredients::default(),
            },
        };
        tracing::info!(
            "Loaded reference data: {} primary, {} secondary, {} impact, {} existing records",
            data.primary.len(),
            data.secondary.len(),
            data.impacts.len(),
            data.existing.len()
        );

        Ok(PipelineInputs {
            taxonomy,
            tables,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub graph: IngredientGraph,
    pub records: BTreeMap<String, IngredientRecord>,
    pub propagation: Vec<PropagationReport>,
    pub summary: CoverageSummary,
    pub diagnostics: Diagnostics,
}

pub struct Pipeline {
    config: PipelineConfig,
    inputs: PipelineInputs,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, inputs: PipelineInputs) -> Self {
        Pipeline { config, inputs }
    }

    /// Load every input named by `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self, TaxomapError> {
        let inputs = PipelineInputs::load(&config)?;
        Ok(Pipeline::new(config, inputs))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn inputs(&self) -> &PipelineInputs {
        &self.inputs
    }

    pub fn run(&self) -> Result<PipelineOutput, TaxomapError> {
        let (mut graph, mut diagnostics) = GraphBuilder::new().build(&self.inputs.taxonomy);

        let loader = TieredLoader::new(&self.inputs.tables, &self.inputs.data)
            .with_linking(self.config.linking.clone())
            .with_propagation(self.config.propagation.clone());
        let load = loader.run(&mut graph, &self.inputs.taxonomy)?;
        diagnostics.extend(load.diagnostics);

        let aggregator = NutrientAggregator::new(&self.inputs.data, &self.config.nutrition);
        let (records, aggregation_diagnostics) = aggregator.aggregate_graph(&graph);
        diagnostics.extend(aggregation_diagnostics);

        let summary = CoverageSummary::compute(&graph, &records);
        summary.log();
        if !diagnostics.is_empty() {
            tracing::info!(
                "Run finished with {} diagnostics ({} warnings)",
                diagnostics.len(),
                diagnostics.warnings().count()
            );
        }

        Ok(PipelineOutput {
            graph,
            records,
            propagation: load.propagation,
            summary,
            diagnostics,
        })
    }

    /// Enriched records merged into the existing ingredient records.
    pub fn merged_records(
        &self,
        output: &PipelineOutput,
    ) -> Result<ExistingIngredients, TaxomapError> {
        merge_records(self.inputs.data.existing.clone(), &output.records)
    }

    pub fn mapping_report(&self, output: &PipelineOutput) -> MappingReport {
        MappingReport::build(&output.graph, &self.inputs.data)
    }

    pub fn audit(&self) -> Vec<AuditEntry> {
        audit_links(&self.inputs.taxonomy, &self.inputs.tables.primary)
    }
}
