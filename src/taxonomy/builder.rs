//! Construction of an [`IngredientGraph`] from a taxonomy source.
//!
//! The taxonomy lists, per ingredient, its parents and children. The lists are not guaranteed
//! to agree with each other (an entry may name a child that never lists it back, or a child that
//! has no entry of its own), so the builder turns every listed edge into a symmetric one and
//! creates the nodes that are only known through references.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    diagnostic::{Diagnostic, Diagnostics},
    error::TaxomapError,
    taxonomy::{IngredientGraph, IngredientNode},
};

/// Field holding the primary-database code embedded in a taxonomy entry.
pub const EMBEDDED_CODE_FIELD: &str = "ciqual_food_code";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyEntry {
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub embedded_code: Option<String>,
}

/// Parsed taxonomy: ingredient id to its declared relations and embedded code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomySource {
    entries: BTreeMap<String, TaxonomyEntry>,
}

impl TaxonomySource {
    pub fn new(entries: BTreeMap<String, TaxonomyEntry>) -> Self {
        TaxonomySource { entries }
    }

    /// Parse a taxonomy document of the shape
    /// `{ "<id>": { "parents": [..], "children": [..], "ciqual_food_code": { "en": ".." } } }`.
    ///
    /// With `require_relations`, an entry without a `parents` or `children` field is rejected;
    /// otherwise a missing field reads as an empty list. A field that is present but not a list of
    /// strings is always rejected. The empty id some exports carry as a placeholder is dropped.
    pub fn from_json(value: &Value, require_relations: bool) -> Result<Self, TaxomapError> {
        let object = value
            .as_object()
            .ok_or_else(|| TaxomapError::taxonomy("<root>", "taxonomy must be a JSON object"))?;

        let mut entries = BTreeMap::new();
        for (id, raw_entry) in object.iter() {
            if id.is_empty() {
                continue;
            }
            let fields = raw_entry
                .as_object()
                .ok_or_else(|| TaxomapError::taxonomy(id, "entry must be a JSON object"))?;
            let entry = TaxonomyEntry {
                parents: id_list(id, fields, "parents", require_relations)?,
                children: id_list(id, fields, "children", require_relations)?,
                embedded_code: embedded_code(id, fields)?,
            };
            entries.insert(id.clone(), entry);
        }
        Ok(TaxonomySource { entries })
    }

    pub fn from_json_str(content: &str, require_relations: bool) -> Result<Self, TaxomapError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_json(&value, require_relations)
    }

    pub fn get(&self, id: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TaxonomyEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids with a non-empty embedded code, and that code.
    pub fn embedded_codes(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries
            .iter()
            .filter_map(|(id, entry)| entry.embedded_code.as_ref().map(|code| (id, code)))
    }
}

fn id_list(
    id: &str,
    fields: &Map<String, Value>,
    field: &str,
    required: bool,
) -> Result<Vec<String>, TaxomapError> {
    match fields.get(field) {
        None | Some(Value::Null) if !required => Ok(Vec::new()),
        None | Some(Value::Null) => Err(TaxomapError::taxonomy(
            id,
            format!("missing required field '{field}'"),
        )),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    TaxomapError::taxonomy(id, format!("'{field}' must only contain strings"))
                })
            })
            .collect(),
        Some(_) => Err(TaxomapError::taxonomy(
            id,
            format!("'{field}' must be a list of ids"),
        )),
    }
}

/// The embedded code is either a bare string or a language-keyed object whose `en` value holds
/// the code. An empty string means "no code".
fn embedded_code(id: &str, fields: &Map<String, Value>) -> Result<Option<String>, TaxomapError> {
    let code = match fields.get(EMBEDDED_CODE_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        Some(Value::Object(by_lang)) => match by_lang.get("en") {
            None | Some(Value::Null) => None,
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            Some(_) => {
                return Err(TaxomapError::taxonomy(
                    id,
                    format!("'{EMBEDDED_CODE_FIELD}.en' must be a string"),
                ))
            }
        },
        Some(_) => {
            return Err(TaxomapError::taxonomy(
                id,
                format!("'{EMBEDDED_CODE_FIELD}' must be a string or an object"),
            ))
        }
    };
    Ok(code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty()))
}

/// Builds the node map of a run. See the module documentation for the repair rules.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    diagnostics: Diagnostics,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(mut self, source: &TaxonomySource) -> (IngredientGraph, Diagnostics) {
        let mut graph = IngredientGraph::new();
        for (id, _) in source.iter() {
            graph.insert(IngredientNode::new(id.as_str()));
        }

        // Children first, so that a parent listing can point at a referenced-only child.
        for (id, entry) in source.iter() {
            for child in entry.children.iter() {
                graph.link(id, child);
            }
        }

        let referenced_only = graph.len() - source.len();
        if referenced_only > 0 {
            self.diagnostics.push(Diagnostic::Info(format!(
                "created {referenced_only} nodes that are only referenced as children"
            )));
        }

        let mut dangling = 0;
        for (id, entry) in source.iter() {
            for parent in entry.parents.iter() {
                if graph.contains(parent) {
                    graph.link(parent, id);
                } else {
                    tracing::debug!("[GraphBuilder] dropping unknown parent '{parent}' of '{id}'");
                    dangling += 1;
                }
            }
        }
        if dangling > 0 {
            self.diagnostics.push(Diagnostic::Info(format!(
                "dropped {dangling} parent references to ids that are not in the taxonomy"
            )));
        }

        for members in graph.cycles() {
            self.diagnostics.push(Diagnostic::TaxonomyCycle { members });
        }

        tracing::info!(
            "Built ingredient graph: {} nodes from {} taxonomy entries",
            graph.len(),
            source.len()
        );
        (graph, self.diagnostics)
    }
}
