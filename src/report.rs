//! Per-ingredient mapping report and run coverage summary.
//!
//! The mapping report has one row per node describing how it was resolved and which database
//! entries it ended up pointing to. It is written as `;`-separated CSV for spreadsheet review or
//! as JSON.

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, io::Write, path::Path};

use crate::{
    error::TaxomapError,
    nutrition::{IngredientRecord, ReferenceData},
    properties::{substitute_code, CodeSource, Origin},
    taxonomy::{IngredientGraph, IngredientNode},
};

/// Separator used inside a CSV cell that holds several values.
pub const LIST_SEPARATOR: &str = "|";

const CSV_HEADER: [&str; 8] = [
    "OFF_ID",
    "ORIGIN",
    "CODE_NUTRI",
    "NAME_NUTRI",
    "CODE_IMPACT",
    "NAME_IMPACT",
    "MANUAL_TEXT",
    "COMMENT",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingReportRow {
    pub id: String,
    pub origin: Origin,
    pub nutrition_codes: Vec<String>,
    pub nutrition_names: Vec<String>,
    pub impact_codes: Vec<String>,
    pub impact_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl MappingReportRow {
    pub fn from_node(node: &IngredientNode, data: &ReferenceData) -> Self {
        let mut row = MappingReportRow {
            id: node.id.clone(),
            origin: node.origin,
            ..Default::default()
        };

        if node.codes.has(CodeSource::Primary) {
            for raw in node.codes(CodeSource::Primary) {
                let code = substitute_code(raw);
                row.nutrition_codes.push(code.to_string());
                if let Some(entry) = data.primary.get(code) {
                    row.nutrition_names.push(entry.name.clone());
                }
                if let Some(impact) = data.impacts.get(code) {
                    row.impact_codes.push(code.to_string());
                    if let Some(name) = &impact.name {
                        row.impact_names.push(name.clone());
                    }
                }
            }
        } else if node.codes.has(CodeSource::Secondary) {
            for code in node.codes(CodeSource::Secondary) {
                row.nutrition_codes.push(code.clone());
                if let Some(entry) = data.secondary.get(code) {
                    row.nutrition_names.push(entry.name.clone());
                }
            }
            row.comment = Some(CodeSource::Secondary.database_name().to_string());
        } else if let Some(reference) = &node.nutrition_ref {
            row.nutrition_names
                .push(data.existing.record_id(reference).to_string());
        }

        if let Some(reference) = &node.impact_ref {
            row.impact_names = vec![data.existing.record_id(reference).to_string()];
        }
        if let Some(entry) = &node.manual_entry {
            row.manual_text = entry.text.clone();
            if row.comment.is_none() {
                row.comment = entry.comment.clone();
            }
        }
        row
    }

    fn csv_record(&self) -> [String; 8] {
        [
            self.id.clone(),
            self.origin.label().to_string(),
            self.nutrition_codes.join(LIST_SEPARATOR),
            self.nutrition_names.join(LIST_SEPARATOR),
            self.impact_codes.join(LIST_SEPARATOR),
            self.impact_names.join(LIST_SEPARATOR),
            self.manual_text.clone().unwrap_or_default(),
            self.comment.clone().unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingReport {
    pub rows: Vec<MappingReportRow>,
}

impl MappingReport {
    pub fn build(graph: &IngredientGraph, data: &ReferenceData) -> Self {
        MappingReport {
            rows: graph
                .nodes()
                .map(|node| MappingReportRow::from_node(node, data))
                .collect(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TaxomapError> {
        let mut wtr = WriterBuilder::new().delimiter(b';').from_writer(writer);
        wtr.write_record(CSV_HEADER)?;
        for row in self.rows.iter() {
            wtr.write_record(row.csv_record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<(), TaxomapError> {
        tracing::debug!("Writing mapping report to {:?}", path.as_ref());
        self.write_csv(File::create(path)?)
    }

    pub fn to_json(&self) -> Result<String, TaxomapError> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }
}

/// Node counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub nodes: usize,
    pub by_origin: BTreeMap<Origin, usize>,
    pub ambiguous_primary: usize,
    pub ambiguous_secondary: usize,
    pub with_nutriments: usize,
    pub with_impact_sources: usize,
}

impl CoverageSummary {
    pub fn compute(graph: &IngredientGraph, records: &BTreeMap<String, IngredientRecord>) -> Self {
        let by_origin = Origin::ALL
            .iter()
            .map(|origin| (*origin, graph.count_origin(*origin)))
            .collect();
        CoverageSummary {
            nodes: graph.len(),
            by_origin,
            ambiguous_primary: graph.count_ambiguous(CodeSource::Primary),
            ambiguous_secondary: graph.count_ambiguous(CodeSource::Secondary),
            with_nutriments: records.values().filter(|r| !r.nutriments.is_empty()).count(),
            with_impact_sources: records
                .values()
                .filter(|r| r.environmental_impact_data_sources.is_some())
                .count(),
        }
    }

    pub fn resolved(&self) -> usize {
        self.nodes - self.unresolved()
    }

    pub fn unresolved(&self) -> usize {
        self.by_origin.get(&Origin::None).copied().unwrap_or_default()
    }

    pub fn log(&self) {
        tracing::info!(
            "[Summary] {} nodes, {} resolved, {} with nutriments, {} with impact sources",
            self.nodes,
            self.resolved(),
            self.with_nutriments,
            self.with_impact_sources
        );
        for (origin, count) in self.by_origin.iter() {
            tracing::info!("[Summary]   {origin}: {count}");
        }
    }
}
