//! Shared test utilities for graph and tier testing

use crate::{
    linking::{LinkTable, LinkTables},
    properties::{CodeSource, Origin},
    taxonomy::{GraphBuilder, IngredientGraph, TaxonomySource},
};
use serde_json::json;

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Set `codes` on `id` as if a link table had resolved it.
pub fn set_codes(graph: &mut IngredientGraph, id: &str, codes: &[&str]) {
    graph
        .get_mut(id)
        .unwrap()
        .resolve(
            CodeSource::Primary,
            codes.iter().map(|c| c.to_string()).collect(),
            Origin::OwnMapping,
        );
}

/// A small fruit taxonomy:
///
/// ```text
/// en:plant
/// └── en:fruit
///     ├── en:citrus ── en:lemon (13004), en:lime
///     ├── en:apple (embedded 13000) ── en:golden-apple
///     └── en:berry ── en:strawberry
/// en:salt (isolated)
/// ```
pub fn fruit_taxonomy() -> TaxonomySource {
    TaxonomySource::from_json(
        &json!({
            "en:plant": { "parents": [], "children": ["en:fruit"] },
            "en:fruit": { "parents": ["en:plant"], "children": ["en:citrus", "en:apple", "en:berry"] },
            "en:citrus": { "parents": ["en:fruit"], "children": ["en:lemon", "en:lime"] },
            "en:lemon": { "parents": ["en:citrus"], "children": [] },
            "en:lime": { "parents": ["en:citrus"], "children": [] },
            "en:apple": { "parents": ["en:fruit"], "children": ["en:golden-apple"],
                          "ciqual_food_code": { "en": "13000" } },
            "en:berry": { "parents": ["en:fruit"], "children": ["en:strawberry"] },
            "en:salt": { "parents": [], "children": [] },
        }),
        true,
    )
    .unwrap()
}

pub fn fruit_graph() -> (TaxonomySource, IngredientGraph) {
    init_logging();
    let source = fruit_taxonomy();
    let (graph, _) = GraphBuilder::new().build(&source);
    (source, graph)
}

pub fn fruit_links() -> LinkTables {
    let mut primary = LinkTable::new(CodeSource::Primary);
    primary.insert("en:lemon", "13004");
    primary.insert("en:apple", "99999");
    LinkTables {
        primary,
        secondary: LinkTable::new(CodeSource::Secondary),
        ..Default::default()
    }
}
