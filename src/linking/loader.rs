//! The tiered mapping loader.
//!
//! Tiers run in a fixed order and each one only writes nodes whose origin is still
//! [`Origin::None`], so an earlier (higher-priority) decision is never overwritten:
//!
//! 1. [`Tier::Direct`]: codes embedded in the taxonomy
//! 2. [`Tier::OwnMapping`]: the primary link table
//! 3. [`Tier::PrimaryPropagation`]: propagation of primary codes
//! 4. [`Tier::Proxy`]: the duplicate/proxy table
//! 5. [`Tier::Secondary`] and [`Tier::SecondaryPropagation`]: the secondary link table and
//!    propagation of secondary codes, when enabled
//! 6. [`Tier::ManualEntry`]: the manual-entry table
//!
//! Rows naming an id absent from the graph are skipped with a
//! [`Diagnostic::UnknownIngredient`]; the loader never creates nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    config::{LinkingConfig, PropagationConfig},
    diagnostic::{Diagnostic, Diagnostics},
    error::TaxomapError,
    linking::tables::{LinkTables, ManualEntryTable, ManualValue, ProxyRow, ProxyTable},
    nutrition::ReferenceData,
    propagation::{PropagationEngine, PropagationReport},
    properties::{CodeSource, Origin, ProxyUse},
    taxonomy::{IngredientGraph, ManualEntry, TaxonomySource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Direct,
    OwnMapping,
    PrimaryPropagation,
    Proxy,
    Secondary,
    SecondaryPropagation,
    ManualEntry,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Direct => "direct codes",
            Tier::OwnMapping => "primary link table",
            Tier::PrimaryPropagation => "primary propagation",
            Tier::Proxy => "proxy table",
            Tier::Secondary => "secondary link table",
            Tier::SecondaryPropagation => "secondary propagation",
            Tier::ManualEntry => "manual entries",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOutcome {
    pub tier: Tier,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub tiers: Vec<TierOutcome>,
    pub propagation: Vec<PropagationReport>,
    pub diagnostics: Diagnostics,
}

impl LoadReport {
    pub fn resolved_by(&self, tier: Tier) -> usize {
        self.tiers
            .iter()
            .filter(|t| t.tier == tier)
            .map(|t| t.resolved)
            .sum()
    }

    fn record(&mut self, tier: Tier, resolved: usize) {
        tracing::info!("[Loader] {tier}: resolved {resolved} nodes");
        self.tiers.push(TierOutcome { tier, resolved });
    }
}

pub struct TieredLoader<'a> {
    tables: &'a LinkTables,
    data: &'a ReferenceData,
    linking: LinkingConfig,
    propagation: PropagationConfig,
}

impl<'a> TieredLoader<'a> {
    pub fn new(tables: &'a LinkTables, data: &'a ReferenceData) -> Self {
        TieredLoader {
            tables,
            data,
            linking: LinkingConfig::default(),
            propagation: PropagationConfig::default(),
        }
    }

    pub fn with_linking(mut self, linking: LinkingConfig) -> Self {
        self.linking = linking;
        self
    }

    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }

    fn engine(&self, source: CodeSource) -> PropagationEngine {
        PropagationEngine::new(source)
            .with_max_passes(self.propagation.max_passes)
            .fail_on_limit(self.propagation.fail_on_convergence_limit)
    }

    /// Run every tier in order over `graph`.
    pub fn run(
        &self,
        graph: &mut IngredientGraph,
        taxonomy: &TaxonomySource,
    ) -> Result<LoadReport, TaxomapError> {
        let mut report = LoadReport::default();

        let resolved = self.apply_direct(graph, taxonomy);
        report.record(Tier::Direct, resolved);

        let resolved = self.apply_links(graph, CodeSource::Primary, &mut report.diagnostics);
        report.record(Tier::OwnMapping, resolved);

        let propagated = self.engine(CodeSource::Primary).run(graph)?;
        report.record(Tier::PrimaryPropagation, propagated.resolved());
        report.diagnostics.extend(propagated.diagnostics.clone());
        report.propagation.push(propagated);

        let resolved = self.apply_proxies(graph, &mut report.diagnostics);
        report.record(Tier::Proxy, resolved);

        if self.linking.use_secondary {
            let resolved = self.apply_links(graph, CodeSource::Secondary, &mut report.diagnostics);
            report.record(Tier::Secondary, resolved);

            let propagated = self.engine(CodeSource::Secondary).run(graph)?;
            report.record(Tier::SecondaryPropagation, propagated.resolved());
            report.diagnostics.extend(propagated.diagnostics.clone());
            report.propagation.push(propagated);
        } else {
            tracing::debug!("[Loader] secondary tiers disabled");
        }

        let resolved = self.apply_manual_entries(graph, &mut report.diagnostics);
        report.record(Tier::ManualEntry, resolved);

        Ok(report)
    }

    /// Tier 1: the code embedded in each taxonomy entry.
    pub fn apply_direct(&self, graph: &mut IngredientGraph, taxonomy: &TaxonomySource) -> usize {
        let mut resolved = 0;
        for (id, code) in taxonomy.embedded_codes() {
            if let Some(node) = graph.get_mut(id) {
                if node.resolve(CodeSource::Primary, vec![code.clone()], Origin::Direct) {
                    resolved += 1;
                }
            }
        }
        resolved
    }

    /// Tiers 2 and 5: every code a link table lists for an id.
    pub fn apply_links(
        &self,
        graph: &mut IngredientGraph,
        source: CodeSource,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let table = self.tables.links(source);
        let origin = match source {
            CodeSource::Primary => Origin::OwnMapping,
            CodeSource::Secondary => Origin::ManualEntry,
        };
        let mut resolved = 0;
        for (id, codes) in table.iter() {
            let Some(node) = graph.get_mut(id) else {
                diagnostics.push(Diagnostic::UnknownIngredient {
                    table: table.name(),
                    id: id.clone(),
                });
                continue;
            };
            if node.resolve(source, codes.clone(), origin) {
                resolved += 1;
            }
        }
        resolved
    }

    /// Tier 4: borrow nutrition and impact references through the proxy table.
    pub fn apply_proxies(&self, graph: &mut IngredientGraph, diagnostics: &mut Diagnostics) -> usize {
        let mut resolved = 0;
        for row in self.tables.proxies.iter() {
            if !graph.contains(&row.id) {
                diagnostics.push(Diagnostic::UnknownIngredient {
                    table: ProxyTable::NAME.to_string(),
                    id: row.id.clone(),
                });
                continue;
            }
            let mut borrowed = false;
            if row.uses.contains(ProxyUse::Nutrition) {
                match self.borrow_nutrition(graph, row) {
                    Some(true) => {
                        resolved += 1;
                        borrowed = true;
                    }
                    Some(false) => borrowed = true,
                    None => {}
                }
            }
            if row.uses.contains(ProxyUse::Impact) && self.borrow_impact(graph, row) {
                borrowed = true;
            }
            if !borrowed {
                diagnostics.push(Diagnostic::UnresolvedProxy {
                    id: row.id.clone(),
                    reference: row.reference.clone(),
                });
            }
        }
        resolved
    }

    /// `Some(true)` when the node got resolved, `Some(false)` when it was already resolved, `None`
    /// when the reference had nothing to lend.
    fn borrow_nutrition(&self, graph: &mut IngredientGraph, row: &ProxyRow) -> Option<bool> {
        if graph.get(&row.id).is_some_and(|n| n.is_resolved()) {
            return Some(false);
        }

        let reference_codes = graph
            .get(&row.reference)
            .map(|r| r.codes(CodeSource::Primary).to_vec())
            .unwrap_or_default();
        let node = graph.get_mut(&row.id)?;
        if !reference_codes.is_empty() {
            return Some(node.resolve(
                CodeSource::Primary,
                reference_codes,
                Origin::ManualProxy,
            ));
        }

        let existing = &self.data.existing;
        if !existing.has_nutriments(&row.reference) {
            return None;
        }
        let by_name = self
            .data
            .primary
            .code_for_name(existing.record_id(&row.reference));
        match by_name {
            Some(code) => Some(node.resolve(
                CodeSource::Primary,
                vec![code.to_string()],
                Origin::ManualProxy,
            )),
            None => {
                node.nutrition_ref = Some(row.reference.clone());
                Some(node.mark(Origin::ManualProxy))
            }
        }
    }

    /// Returns whether the node gained an impact reference.
    fn borrow_impact(&self, graph: &mut IngredientGraph, row: &ProxyRow) -> bool {
        let inherited = graph
            .get(&row.reference)
            .and_then(|r| r.impact_ref.clone())
            .or_else(|| {
                self.data
                    .existing
                    .has_impacts(&row.reference)
                    .then(|| row.reference.clone())
            });
        match (graph.get_mut(&row.id), inherited) {
            (Some(node), Some(reference)) if node.impact_ref.is_none() => {
                node.impact_ref = Some(reference);
                true
            }
            _ => false,
        }
    }

    /// Tier 6: attach the manual entry of every node that is still unresolved.
    pub fn apply_manual_entries(
        &self,
        graph: &mut IngredientGraph,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let mut resolved = 0;
        for row in self.tables.manual_entries.iter() {
            let Some(node) = graph.get_mut(&row.id) else {
                diagnostics.push(Diagnostic::UnknownIngredient {
                    table: ManualEntryTable::NAME.to_string(),
                    id: row.id.clone(),
                });
                continue;
            };
            if node.is_resolved() {
                continue;
            }
            let text = match &row.value {
                Some(ManualValue::Code(code)) => {
                    node.resolve(CodeSource::Secondary, vec![code.clone()], Origin::ManualEntry);
                    None
                }
                Some(ManualValue::Text(text)) => Some(text.clone()),
                None => None,
            };
            node.mark(Origin::ManualEntry);
            node.manual_entry = Some(ManualEntry {
                text,
                comment: row.comment.clone(),
            });
            resolved += 1;
        }
        resolved
    }
}
