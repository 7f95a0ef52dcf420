//! The ingredient node map.
//!
//! [`IngredientGraph`] is a keyed map of [`IngredientNode`]s whose `parents`/`children` sets are
//! kept mutually consistent. Nodes are only ever added (never removed) and their resolution
//! state only grows, see [`IngredientNode::resolve`].

use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use serde::{Deserialize, Serialize};
use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt,
};

use crate::properties::{CodeSet, CodeSource, Origin};

/// Which neighbor set a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Children,
    Parents,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Children => write!(f, "children"),
            Relation::Parents => write!(f, "parents"),
        }
    }
}

/// Free-text entry attached by the manual-entry tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntry {
    /// Verbatim value of the table's code column, when it held something other than a code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientNode {
    pub id: String,
    pub parents: BTreeSet<String>,
    pub children: BTreeSet<String>,
    #[serde(default)]
    pub codes: CodeSet,
    #[serde(default)]
    pub origin: Origin,
    /// Ingredient whose environmental-impact data this node borrows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_ref: Option<String>,
    /// Ingredient whose raw nutrient data this node borrows in place of reference codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_entry: Option<ManualEntry>,
}

impl IngredientNode {
    pub fn new(id: impl Into<String>) -> Self {
        IngredientNode {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn neighbors(&self, relation: Relation) -> &BTreeSet<String> {
        match relation {
            Relation::Children => &self.children,
            Relation::Parents => &self.parents,
        }
    }

    pub fn codes(&self, source: CodeSource) -> &[String] {
        self.codes.get(source)
    }

    pub fn is_resolved(&self) -> bool {
        self.origin.is_resolved()
    }

    /// Unresolved for `source` with at least one parent and one child: the nodes the propagation
    /// convergence loops try to drive down.
    pub fn is_ambiguous(&self, source: CodeSource) -> bool {
        !self.codes.has(source) && !self.parents.is_empty() && !self.children.is_empty()
    }

    /// Record `codes` for `source` and tag the node with `origin`.
    ///
    /// Only a node whose origin is still [`Origin::None`] accepts the write, and an empty code
    /// list never resolves a node. Returns whether the node changed.
    pub fn resolve(&mut self, source: CodeSource, codes: Vec<String>, origin: Origin) -> bool {
        if self.is_resolved() || codes.is_empty() || !origin.is_resolved() {
            return false;
        }
        *self.codes.get_mut(source) = codes;
        self.origin = origin;
        true
    }

    /// Tag the node with `origin` without touching its codes. Same guard as [`Self::resolve`].
    pub fn mark(&mut self, origin: Origin) -> bool {
        if self.is_resolved() || !origin.is_resolved() {
            return false;
        }
        self.origin = origin;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientGraph {
    nodes: BTreeMap<String, IngredientNode>,
}

impl IngredientGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&IngredientNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut IngredientNode> {
        self.nodes.get_mut(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &IngredientNode> {
        self.nodes.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, IngredientNode> {
        self.nodes.iter()
    }

    /// Insert `node` unless a node with the same id already exists. Returns whether it was added.
    pub fn insert(&mut self, node: IngredientNode) -> bool {
        match self.nodes.entry(node.id.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(node);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Add the `parent -> child` edge on both sides, creating either endpoint if it is missing.
    pub fn link(&mut self, parent: &str, child: &str) {
        self.nodes
            .entry(parent.to_string())
            .or_insert_with(|| IngredientNode::new(parent))
            .children
            .insert(child.to_string());
        self.nodes
            .entry(child.to_string())
            .or_insert_with(|| IngredientNode::new(child))
            .parents
            .insert(parent.to_string());
    }

    pub fn count_origin(&self, origin: Origin) -> usize {
        self.nodes.values().filter(|n| n.origin == origin).count()
    }

    pub fn count_ambiguous(&self, source: CodeSource) -> usize {
        self.nodes
            .values()
            .filter(|n| n.is_ambiguous(source))
            .count()
    }

    /// Verifies that every edge is recorded on both of its endpoints. Returns a description of
    /// each violation; an empty result means the graph is consistent.
    pub fn symmetry_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (id, node) in self.nodes.iter() {
            for child in node.children.iter() {
                match self.nodes.get(child) {
                    Some(c) if c.parents.contains(id) => {}
                    Some(_) => errors.push(format!("'{child}' does not list parent '{id}'")),
                    None => errors.push(format!("child '{child}' of '{id}' is not in the graph")),
                }
            }
            for parent in node.parents.iter() {
                match self.nodes.get(parent) {
                    Some(p) if p.children.contains(id) => {}
                    Some(_) => errors.push(format!("'{parent}' does not list child '{id}'")),
                    None => {
                        errors.push(format!("parent '{parent}' of '{id}' is not in the graph"))
                    }
                }
            }
        }
        errors
    }

    /// Groups of nodes that reach each other through the parent to child relation. Each group is
    /// sorted, and groups are ordered by their first member.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (id, node) in self.nodes.iter() {
            graph.add_node(id.as_str());
            for child in node.children.iter() {
                graph.add_edge(id.as_str(), child.as_str(), ());
            }
        }
        let mut cycles = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|id| graph.contains_edge(*id, *id))
            })
            .map(|component| {
                let mut members = component
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>();
                members.sort();
                members
            })
            .collect::<Vec<_>>();
        cycles.sort();
        cycles
    }
}

impl<'a> IntoIterator for &'a IngredientGraph {
    type Item = (&'a String, &'a IngredientNode);
    type IntoIter = btree_map::Iter<'a, String, IngredientNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
