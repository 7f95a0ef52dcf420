/// [crate::properties] contains the basic building blocks shared by every stage of a linking run:
/// where a node's codes came from ([Origin]), which reference database a code belongs to
/// ([CodeSource]), and what a proxy row allows a node to borrow ([ProxyUse]).
pub use enumset::EnumSet;
use enumset::*;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};
use unicode_normalization::UnicodeNormalization;

/// Codes that appear in the taxonomy and the curated link tables but were retired from the
/// primary database. They are remapped to their current equivalent before every lookup.
pub static STALE_CODE_SUBSTITUTIONS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([("26132", "26210"), ("7430", "7432"), ("13082", "13024")])
});

/// Returns the current equivalent of `code`, or `code` itself when it was never retired.
pub fn substitute_code(code: &str) -> &str {
    STALE_CODE_SUBSTITUTIONS.get(code).copied().unwrap_or(code)
}

/// Canonical form of an ingredient id as found in external tables: trimmed, NFC-normalized and
/// lowercased. Taxonomy keys are already canonical; spreadsheets exported by hand often aren't.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().nfc().collect::<String>().to_lowercase()
}

/// How the reference codes of a node were obtained.
///
/// Variants are declared from lowest to highest priority so that the derived [Ord] matches the
/// tier priority: `Direct > OwnMapping > ManualProxy > ParentsChildrenProxy > ManualEntry > None`.
/// A tier only ever writes a node whose origin is still [Origin::None], which is what keeps a
/// higher-priority decision from being overwritten by a later, lower-priority tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    None,
    ManualEntry,
    ParentsChildrenProxy,
    ManualProxy,
    OwnMapping,
    Direct,
}

impl Origin {
    pub const ALL: [Origin; 6] = [
        Origin::Direct,
        Origin::OwnMapping,
        Origin::ManualProxy,
        Origin::ParentsChildrenProxy,
        Origin::ManualEntry,
        Origin::None,
    ];

    pub fn is_resolved(&self) -> bool {
        *self != Origin::None
    }

    /// Label used in mapping reports. Unresolved nodes are reported as `no_reference`.
    pub fn label(&self) -> &'static str {
        match self {
            Origin::None => "no_reference",
            Origin::ManualEntry => "manual_entry",
            Origin::ParentsChildrenProxy => "parents_children_proxy",
            Origin::ManualProxy => "manual_proxy",
            Origin::OwnMapping => "own_mapping",
            Origin::Direct => "direct",
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The external database a reference code points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSource {
    Primary,
    Secondary,
}

impl CodeSource {
    pub fn database_name(&self) -> &'static str {
        match self {
            CodeSource::Primary => "ciqual",
            CodeSource::Secondary => "fcen",
        }
    }

    /// Origin recorded on nodes that a propagation pass over this source resolves.
    pub fn propagation_origin(&self) -> Origin {
        match self {
            CodeSource::Primary => Origin::ParentsChildrenProxy,
            CodeSource::Secondary => Origin::ManualEntry,
        }
    }
}

impl Display for CodeSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.database_name())
    }
}

/// Ordered reference codes per [CodeSource].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<String>,
}

impl CodeSet {
    pub fn get(&self, source: CodeSource) -> &[String] {
        match source {
            CodeSource::Primary => &self.primary,
            CodeSource::Secondary => &self.secondary,
        }
    }

    pub fn get_mut(&mut self, source: CodeSource) -> &mut Vec<String> {
        match source {
            CodeSource::Primary => &mut self.primary,
            CodeSource::Secondary => &mut self.secondary,
        }
    }

    pub fn has(&self, source: CodeSource) -> bool {
        !self.get(source).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// What a duplicate/proxy row lets the referencing node borrow from its reference.
#[derive(Debug, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumSetType)]
#[enumset(repr = "u8")]
#[serde(rename_all = "snake_case")]
pub enum ProxyUse {
    Nutrition,
    Impact,
}

/// Interprets the `proxy_type` column of a proxy table: `1` borrows nutrition only, `2` borrows
/// impacts only, anything else borrows both.
pub fn proxy_kind_from_column(raw: &str) -> EnumSet<ProxyUse> {
    match raw.trim() {
        "1" | "1.0" => EnumSet::only(ProxyUse::Nutrition),
        "2" | "2.0" => EnumSet::only(ProxyUse::Impact),
        _ => EnumSet::all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_ordering_matches_tier_priority() {
        assert!(Origin::Direct > Origin::OwnMapping);
        assert!(Origin::OwnMapping > Origin::ManualProxy);
        assert!(Origin::ManualProxy > Origin::ParentsChildrenProxy);
        assert!(Origin::ParentsChildrenProxy > Origin::ManualEntry);
        assert!(Origin::ManualEntry > Origin::None);
        assert!(!Origin::None.is_resolved());
    }

    #[test]
    fn stale_codes_are_substituted() {
        assert_eq!(substitute_code("26132"), "26210");
        assert_eq!(substitute_code("13082"), "13024");
        assert_eq!(substitute_code("18066"), "18066");
    }

    #[test]
    fn proxy_column_parsing() {
        assert_eq!(proxy_kind_from_column("1"), EnumSet::only(ProxyUse::Nutrition));
        assert_eq!(proxy_kind_from_column(" 2 "), EnumSet::only(ProxyUse::Impact));
        assert_eq!(proxy_kind_from_column(""), EnumSet::all());
        assert_eq!(proxy_kind_from_column("0"), EnumSet::all());
    }

    #[test]
    fn ids_are_normalized() {
        assert_eq!(normalize_id("  En:Water "), "en:water");
    }
}
