//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const TAXONOMY: &str = r#"{
  "": {},
  "en:fruit": { "parents": [], "children": ["en:citrus", "en:apple", "en:quince"] },
  "en:citrus": { "parents": ["en:fruit"], "children": ["en:lemon", "en:lime"] },
  "en:lemon": { "parents": ["en:citrus"], "children": [] },
  "en:lime": { "parents": ["en:citrus"], "children": [] },
  "en:apple": { "parents": ["en:fruit"], "children": [], "ciqual_food_code": { "en": "13000" } },
  "en:tuna": { "parents": [], "children": [], "ciqual_food_code": { "en": "26132" } },
  "en:ghee": { "parents": [], "children": [] },
  "en:yuzu": { "parents": [], "children": [] },
  "en:tonka": { "parents": [], "children": [] },
  "en:dust": { "parents": [], "children": [] }
}"#;

pub const PRIMARY_LINKS: &str = "OFF_ID,CIQUAL_ID,CIQUAL_INDEX_FR
en:lemon,13004,Citron
en:lemon,13039,Citron vert
en:apple,13099,Pomme
en:unknown-root,11111,Inconnu
";

pub const SECONDARY_LINKS: &str = "OFF_ID,FCEN_ID
en:yuzu,4521
";

pub const PROXIES: &str = "OFF_ID,reference,proxy_type
en:ghee,en:butter,0
";

pub const MANUAL_ENTRIES: &str = "OFF_ID,CODE,SOURCE
en:tonka,see supplier sheet,supplier
en:lemon,999,never applied
";

pub const PRIMARY_DATABASE: &str = r#"{
  "13000": { "alim_nom_eng": "Apple, raw", "nutriments": {
    "sugars": { "value": 11.6, "min": 9.0, "max": 14.0 },
    "energy-kcal": { "value": 54.0 } } },
  "13004": { "alim_nom_eng": "Lemon, raw", "nutriments": {
    "proteins": { "value": 10.0, "min": 8.0, "max": 12.0 },
    "fat": { "value": 0.3 } } },
  "13039": { "alim_nom_eng": "Lime, raw", "nutriments": {
    "proteins": { "value": 20.0, "min": 18.0, "max": 22.0 } } },
  "26210": { "alim_nom_eng": "Tuna, canned", "nutriments": {
    "proteins": { "value": 25.0, "max": 140.0 } } }
}"#;

pub const SECONDARY_DATABASE: &str = r#"{
  "4521": { "FoodDescription": "Yuzu, raw", "nutriments": {
    "fiber": { "value": 5.0, "stdev": 1.0 },
    "sugars": { "value": 2.0, "stdev": null } } }
}"#;

pub const IMPACT_DATABASE: &str = r#"[
  { "ciqual_code": "13000", "LCI_name": "Apple, conventional, at farm gate" }
]"#;

pub const EXISTING_INGREDIENTS: &str = r#"{
  "en:butter": { "id": "en:butter", "nutriments": { "fat": { "value": 82.0, "min": 80.0, "max": 84.0 } },
                 "impacts": { "co2": 9.1 } },
  "en:apple": { "id": "en:apple", "ciqual_proxy_food_code": "13000" }
}"#;

/// Writes every input file into `temp_dir` and a config naming them by relative path.
///
/// Returns the path to the config file.
#[allow(dead_code)]
pub fn write_fixture(temp_dir: &TempDir, extra_config: &str) -> PathBuf {
    let root = temp_dir.path();
    let files = [
        ("taxonomy.json", TAXONOMY),
        ("ciqual_links.csv", PRIMARY_LINKS),
        ("fcen_links.csv", SECONDARY_LINKS),
        ("duplicates.csv", PROXIES),
        ("manual_sources.csv", MANUAL_ENTRIES),
        ("ciqual.json", PRIMARY_DATABASE),
        ("fcen.json", SECONDARY_DATABASE),
        ("agribalyse.json", IMPACT_DATABASE),
        ("ingredients_data.json", EXISTING_INGREDIENTS),
    ];
    for (name, content) in files {
        std::fs::write(root.join(name), content).unwrap();
    }

    let config = format!(
        r#"[inputs]
taxonomy = "taxonomy.json"
primary_links = "ciqual_links.csv"
primary_database = "ciqual.json"
secondary_links = "fcen_links.csv"
secondary_database = "fcen.json"
proxies = "duplicates.csv"
manual_entries = "manual_sources.csv"
impact_database = "agribalyse.json"
existing_ingredients = "ingredients_data.json"

{extra_config}
"#
    );
    let config_path = root.join("taxomap.toml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}
