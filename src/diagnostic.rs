//! Non-fatal findings collected while linking a taxonomy.
//!
//! External tables are noisier than the taxonomy and partial coverage is expected, so most
//! problems encountered during a run are recorded as a [`Diagnostic`] instead of aborting it.
//! Each diagnostic is also emitted through `tracing` at the level returned by
//! [`Diagnostic::level`] when it is recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{propagation::Phase, properties::CodeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A table row references an id that is not part of the graph. The row is skipped.
    UnknownIngredient { table: String, id: String },
    /// A proxy row whose reference carries neither resolved codes nor raw data.
    UnresolvedProxy { id: String, reference: String },
    /// A propagation phase was still making progress when it hit its pass limit.
    ConvergenceLimit {
        phase: Phase,
        source: CodeSource,
        passes: usize,
    },
    /// A resolved code has no entry in its reference database and was left out of aggregation.
    MissingRecord { database: String, code: String },
    /// Nodes that are mutually reachable through the parent to child relation.
    TaxonomyCycle { members: Vec<String> },
    Info(String),
    Warning(String),
}

impl Diagnostic {
    pub fn level(&self) -> Severity {
        match self {
            Diagnostic::UnknownIngredient { .. }
            | Diagnostic::UnresolvedProxy { .. }
            | Diagnostic::TaxonomyCycle { .. }
            | Diagnostic::Info(_) => Severity::Info,
            Diagnostic::ConvergenceLimit { .. }
            | Diagnostic::MissingRecord { .. }
            | Diagnostic::Warning(_) => Severity::Warning,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.level() == Severity::Warning
    }

    /// Log this diagnostic at its level.
    pub fn emit(&self) {
        match self.level() {
            Severity::Info => tracing::info!("{}", self),
            Severity::Warning => tracing::warn!("{}", self),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownIngredient { table, id } => {
                write!(f, "[{table}] '{id}' is not in the taxonomy graph, row skipped")
            }
            Diagnostic::UnresolvedProxy { id, reference } => write!(
                f,
                "proxy reference '{reference}' of '{id}' has no codes or data to borrow"
            ),
            Diagnostic::ConvergenceLimit {
                phase,
                source,
                passes,
            } => write!(
                f,
                "{source} propagation over {phase} stopped after {passes} passes without reaching a fixed point"
            ),
            Diagnostic::MissingRecord { database, code } => {
                write!(f, "code '{code}' has no record in {database}")
            }
            Diagnostic::TaxonomyCycle { members } => {
                write!(f, "taxonomy cycle between: {}", members.join(", "))
            }
            Diagnostic::Info(msg) => write!(f, "{msg}"),
            Diagnostic::Warning(msg) => write!(f, "{msg}"),
        }
    }
}

/// Append-only collection of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_warning())
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
