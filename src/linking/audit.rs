//! Comparison of the primary link table against codes embedded in the taxonomy.
//!
//! Used while curating the link table: an id that the taxonomy already maps directly keeps its
//! embedded code, so a link row for it is either redundant or a disagreement worth reviewing.

use serde::{Deserialize, Serialize};

use crate::{linking::tables::LinkTable, properties::substitute_code, taxonomy::TaxonomySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// The table lists exactly the embedded code.
    Same,
    /// The table lists the embedded code among others.
    Includes,
    /// The table never lists the embedded code.
    Differs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub embedded_code: String,
    pub link_codes: Vec<String>,
    pub status: AuditStatus,
}

/// One entry per id that has both an embedded code and link-table rows, in id order. Codes are
/// compared after stale-code substitution.
pub fn audit_links(taxonomy: &TaxonomySource, links: &LinkTable) -> Vec<AuditEntry> {
    let entries = taxonomy
        .embedded_codes()
        .filter_map(|(id, embedded)| {
            let link_codes = links.codes(id)?;
            let embedded_code = substitute_code(embedded);
            let matches = link_codes
                .iter()
                .filter(|code| substitute_code(code) == embedded_code)
                .count();
            let status = match (matches, link_codes.len()) {
                (0, _) => AuditStatus::Differs,
                (m, n) if m == n => AuditStatus::Same,
                _ => AuditStatus::Includes,
            };
            Some(AuditEntry {
                id: id.clone(),
                embedded_code: embedded.clone(),
                link_codes: link_codes.to_vec(),
                status,
            })
        })
        .collect::<Vec<_>>();

    let differing = entries
        .iter()
        .filter(|e| e.status == AuditStatus::Differs)
        .count();
    tracing::info!(
        "[Audit] {} linked ids also carry an embedded code, {} disagree",
        entries.len(),
        differing
    );
    entries
}
