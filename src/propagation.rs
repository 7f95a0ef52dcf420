//! Fixed-point propagation of reference codes across the ingredient graph.
//!
//! An unresolved node borrows the codes of the nearest resolved nodes reachable along one
//! relation: [`collect_codes`] walks depth-first from the node and stops descending at every
//! node that already carries codes for the active [`CodeSource`]. All codes found on every
//! branch are kept; no branch is preferred over another.
//!
//! ## Sweeps and phases
//!
//! A sweep visits every unresolved node once, ordered by ascending size of its neighbor set in
//! the active relation, and writes each result immediately so later nodes of the same sweep
//! already see it. Sweeps are grouped in three phases run in order:
//!
//! 1. [`Phase::Children`]: sweeps over `children`
//! 2. [`Phase::Parents`]: sweeps over `parents`
//! 3. [`Phase::Both`]: a `children` sweep followed by a `parents` sweep
//!
//! Each phase repeats until a pass no longer lowers the number of ambiguous nodes (unresolved,
//! with at least one parent and one child). Because a node only ever accepts its first write,
//! the first phase to resolve a node wins.
//!
//! Every phase is bounded by `max_passes`. Hitting the bound while the ambiguous count is still
//! dropping is reported as [`Diagnostic::ConvergenceLimit`], or as
//! [`TaxomapError::Convergence`] when the engine is configured to fail on it.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

use crate::{
    diagnostic::{Diagnostic, Diagnostics},
    error::TaxomapError,
    properties::{CodeSource, Origin},
    taxonomy::{IngredientGraph, Relation},
};

pub const DEFAULT_MAX_PASSES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Children,
    Parents,
    Both,
}

impl Phase {
    pub const ORDER: [Phase; 3] = [Phase::Children, Phase::Parents, Phase::Both];

    fn relations(&self) -> &'static [Relation] {
        match self {
            Phase::Children => &[Relation::Children],
            Phase::Parents => &[Relation::Parents],
            Phase::Both => &[Relation::Children, Relation::Parents],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Children => write!(f, "children"),
            Phase::Parents => write!(f, "parents"),
            Phase::Both => write!(f, "children and parents"),
        }
    }
}

/// Union of the `source` codes reachable from `start` along `relation`.
///
/// The walk is depth-first with an explicit stack and a visited set shared by the whole call,
/// so it terminates on cyclic graphs and never recurses. A node carrying codes contributes them
/// and is not descended from. Neighbors missing from the graph are ignored. The result is
/// deduplicated and sorted.
pub fn collect_codes(
    graph: &IngredientGraph,
    start: &str,
    relation: Relation,
    source: CodeSource,
) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = graph.get(id) else {
            continue;
        };
        let codes = node.codes(source);
        if !codes.is_empty() {
            found.extend(codes.iter().cloned());
            continue;
        }
        // Reversed so neighbors pop off the stack in their stored order.
        for next in node.neighbors(relation).iter().rev() {
            if !visited.contains(next.as_str()) && graph.contains(next) {
                stack.push(next.as_str());
            }
        }
    }

    found.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub passes: usize,
    pub resolved: usize,
    pub converged: bool,
    pub ambiguous_after: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub source: CodeSource,
    pub phases: Vec<PhaseOutcome>,
    pub diagnostics: Diagnostics,
}

impl PropagationReport {
    pub fn resolved(&self) -> usize {
        self.phases.iter().map(|p| p.resolved).sum()
    }

    pub fn converged(&self) -> bool {
        self.phases.iter().all(|p| p.converged)
    }
}

/// Runs the three propagation phases for one [`CodeSource`].
#[derive(Debug, Clone)]
pub struct PropagationEngine {
    source: CodeSource,
    origin: Origin,
    max_passes: usize,
    fail_on_limit: bool,
}

impl PropagationEngine {
    /// An engine tagging the nodes it resolves with the source's propagation origin.
    pub fn new(source: CodeSource) -> Self {
        PropagationEngine {
            source,
            origin: source.propagation_origin(),
            max_passes: DEFAULT_MAX_PASSES,
            fail_on_limit: false,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn fail_on_limit(mut self, fail: bool) -> Self {
        self.fail_on_limit = fail;
        self
    }

    pub fn source(&self) -> CodeSource {
        self.source
    }

    /// One sweep over `relation`. Returns the number of nodes it resolved.
    pub fn sweep(&self, graph: &mut IngredientGraph, relation: Relation) -> usize {
        let mut order = graph
            .nodes()
            .filter(|node| !node.is_resolved())
            .map(|node| (node.neighbors(relation).len(), node.id.clone()))
            .collect::<Vec<_>>();
        // Stable: ties keep id order.
        order.sort_by_key(|(neighbor_count, _)| *neighbor_count);

        let mut resolved = 0;
        for (_, id) in order {
            let codes = collect_codes(graph, &id, relation, self.source);
            if codes.is_empty() {
                continue;
            }
            if let Some(node) = graph.get_mut(&id) {
                if node.resolve(self.source, codes, self.origin) {
                    resolved += 1;
                }
            }
        }
        resolved
    }

    /// Repeat passes of `phase` until a pass resolves nothing, the ambiguous count stops dropping,
    /// or the pass limit hits.
    pub fn run_phase(&self, graph: &mut IngredientGraph, phase: Phase) -> PhaseOutcome {
        let mut previous = graph.len();
        let mut passes = 0;
        let mut resolved = 0;

        loop {
            let mut pass_resolved = 0;
            for relation in phase.relations() {
                pass_resolved += self.sweep(graph, *relation);
            }
            resolved += pass_resolved;
            passes += 1;

            let ambiguous = graph.count_ambiguous(self.source);
            tracing::debug!(
                "[Propagation] {} over {}: pass {} leaves {} ambiguous nodes",
                self.source,
                phase,
                passes,
                ambiguous
            );

            if pass_resolved == 0 || ambiguous >= previous {
                return PhaseOutcome {
                    phase,
                    passes,
                    resolved,
                    converged: true,
                    ambiguous_after: ambiguous,
                };
            }
            if passes >= self.max_passes {
                return PhaseOutcome {
                    phase,
                    passes,
                    resolved,
                    converged: false,
                    ambiguous_after: ambiguous,
                };
            }
            previous = ambiguous;
        }
    }

    /// Run the children, parents and combined phases in order.
    pub fn run(&self, graph: &mut IngredientGraph) -> Result<PropagationReport, TaxomapError> {
        let mut phases = Vec::with_capacity(Phase::ORDER.len());
        let mut diagnostics = Diagnostics::default();

        for phase in Phase::ORDER {
            let outcome = self.run_phase(graph, phase);
            if !outcome.converged {
                if self.fail_on_limit {
                    return Err(TaxomapError::Convergence(format!(
                        "{} propagation over {} still resolving after {} passes",
                        self.source, phase, outcome.passes
                    )));
                }
                diagnostics.push(Diagnostic::ConvergenceLimit {
                    phase,
                    source: self.source,
                    passes: outcome.passes,
                });
            }
            phases.push(outcome);
        }

        let report = PropagationReport {
            source: self.source,
            phases,
            diagnostics,
        };
        tracing::info!(
            "[Propagation] {} propagation resolved {} nodes",
            self.source,
            report.resolved()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::IngredientNode;

    fn with_codes(graph: &mut IngredientGraph, id: &str, codes: &[&str]) {
        let node = graph.get_mut(id).unwrap();
        node.resolve(
            CodeSource::Primary,
            codes.iter().map(|c| c.to_string()).collect(),
            Origin::OwnMapping,
        );
    }

    /// A -> {B, C}, B -> D; C carries X and D carries Y.
    fn branching_graph() -> IngredientGraph {
        let mut graph = IngredientGraph::new();
        graph.link("A", "B");
        graph.link("A", "C");
        graph.link("B", "D");
        with_codes(&mut graph, "C", &["X"]);
        with_codes(&mut graph, "D", &["Y"]);
        graph
    }

    #[test]
    fn codes_are_unioned_across_branches() {
        let graph = branching_graph();
        assert_eq!(
            collect_codes(&graph, "A", Relation::Children, CodeSource::Primary),
            vec!["X".to_string(), "Y".to_string()]
        );
        assert_eq!(
            collect_codes(&graph, "B", Relation::Children, CodeSource::Primary),
            vec!["Y".to_string()]
        );
    }

    #[test]
    fn walk_stops_at_coded_nodes() {
        let mut graph = branching_graph();
        graph.link("C", "E");
        with_codes(&mut graph, "E", &["Z"]);
        assert_eq!(
            collect_codes(&graph, "A", Relation::Children, CodeSource::Primary),
            vec!["X".to_string(), "Y".to_string()]
        );
    }

    #[test]
    fn cycle_terminates_with_no_codes() {
        let mut graph = IngredientGraph::new();
        graph.link("A", "B");
        graph.link("B", "A");

        for relation in [Relation::Children, Relation::Parents] {
            assert!(collect_codes(&graph, "A", relation, CodeSource::Primary).is_empty());
            assert!(collect_codes(&graph, "B", relation, CodeSource::Primary).is_empty());
        }

        let report = PropagationEngine::new(CodeSource::Primary)
            .run(&mut graph)
            .unwrap();
        assert!(report.converged());
        assert_eq!(report.resolved(), 0);
        assert_eq!(graph.get("A").unwrap().origin, Origin::None);
    }

    #[test]
    fn run_resolves_through_children_then_parents() {
        let mut graph = branching_graph();
        graph.link("C", "F");
        let report = PropagationEngine::new(CodeSource::Primary)
            .run(&mut graph)
            .unwrap();

        let a = graph.get("A").unwrap();
        assert_eq!(a.origin, Origin::ParentsChildrenProxy);
        assert_eq!(a.codes(CodeSource::Primary), ["X", "Y"]);
        // F is a leaf under C: only reachable through its parent.
        let f = graph.get("F").unwrap();
        assert_eq!(f.codes(CodeSource::Primary), ["X"]);
        assert_eq!(report.resolved(), 3);
        assert!(report.converged());
    }

    #[test]
    fn resolved_nodes_are_never_rewritten() {
        let mut graph = branching_graph();
        graph
            .get_mut("A")
            .unwrap()
            .resolve(CodeSource::Primary, vec!["18066".into()], Origin::Direct);

        PropagationEngine::new(CodeSource::Primary)
            .run(&mut graph)
            .unwrap();

        let a = graph.get("A").unwrap();
        assert_eq!(a.origin, Origin::Direct);
        assert_eq!(a.codes(CodeSource::Primary), ["18066"]);
    }

    #[test]
    fn isolated_nodes_stay_unresolved() {
        let mut graph = branching_graph();
        graph.insert(IngredientNode::new("lonely"));
        PropagationEngine::new(CodeSource::Primary)
            .run(&mut graph)
            .unwrap();
        assert_eq!(graph.get("lonely").unwrap().origin, Origin::None);
    }

    #[test]
    fn secondary_propagation_is_tagged_manual_entry() {
        let mut graph = IngredientGraph::new();
        graph.link("P", "Q");
        graph
            .get_mut("Q")
            .unwrap()
            .resolve(CodeSource::Secondary, vec!["501".into()], Origin::ManualEntry);

        PropagationEngine::new(CodeSource::Secondary)
            .run(&mut graph)
            .unwrap();

        let p = graph.get("P").unwrap();
        assert_eq!(p.origin, Origin::ManualEntry);
        assert_eq!(p.codes(CodeSource::Secondary), ["501"]);
        assert!(p.codes(CodeSource::Primary).is_empty());
    }

    #[test]
    fn pass_limit_is_reported() {
        // The first children pass still resolves nodes, so one pass cannot confirm a fixed point.
        let mut graph = branching_graph();
        let outcome = PropagationEngine::new(CodeSource::Primary)
            .with_max_passes(1)
            .run_phase(&mut graph.clone(), Phase::Children);
        assert_eq!(outcome.passes, 1);
        assert!(!outcome.converged);

        let report = PropagationEngine::new(CodeSource::Primary)
            .with_max_passes(1)
            .run(&mut graph.clone())
            .unwrap();
        assert!(!report.converged());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::ConvergenceLimit { phase: Phase::Children, .. })));

        let err = PropagationEngine::new(CodeSource::Primary)
            .with_max_passes(1)
            .fail_on_limit(true)
            .run(&mut graph)
            .unwrap_err();
        assert!(matches!(err, TaxomapError::Convergence(_)));
    }

    #[test]
    fn pass_that_resolves_nothing_converges_within_limit() {
        let mut graph = branching_graph();
        with_codes(&mut graph, "A", &["X"]);
        with_codes(&mut graph, "B", &["Y"]);

        let report = PropagationEngine::new(CodeSource::Primary)
            .with_max_passes(1)
            .run(&mut graph)
            .unwrap();
        assert!(report.converged());
        assert!(report.phases.iter().all(|p| p.passes == 1 && p.resolved == 0));
        assert!(report.diagnostics.is_empty());
    }
}
