//! End-to-end runs of the pipeline over a small on-disk fixture.

mod common;

use common::{init_logging, write_fixture};
use taxomap_core::{
    config::{ConfigProvider, TomlConfigProvider},
    diagnostic::Diagnostic,
    linking::AuditStatus,
    nutrition::NutrientBounds,
    pipeline::Pipeline,
    properties::{CodeSource, Origin},
    TaxomapError,
};
use tempfile::TempDir;
use test_log::test;

fn run_fixture(extra_config: &str) -> (TempDir, Pipeline) {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_fixture(&temp_dir, extra_config);
    let config = TomlConfigProvider::new(config_path).load().unwrap();
    let pipeline = Pipeline::from_config(config).unwrap();
    (temp_dir, pipeline)
}

fn bounds(value: f64, min: f64, max: f64) -> NutrientBounds {
    NutrientBounds { value, min, max }
}

#[test]
fn test_every_tier_contributes() {
    let (_temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();
    let graph = &output.graph;

    // en:quince is only listed as a child of en:fruit.
    assert_eq!(graph.len(), 11);
    assert!(graph.symmetry_errors().is_empty());

    let origin = |id: &str| graph.get(id).unwrap().origin;
    assert_eq!(origin("en:apple"), Origin::Direct);
    assert_eq!(origin("en:tuna"), Origin::Direct);
    assert_eq!(origin("en:lemon"), Origin::OwnMapping);
    assert_eq!(origin("en:citrus"), Origin::ParentsChildrenProxy);
    assert_eq!(origin("en:lime"), Origin::ParentsChildrenProxy);
    assert_eq!(origin("en:fruit"), Origin::ParentsChildrenProxy);
    assert_eq!(origin("en:quince"), Origin::ParentsChildrenProxy);
    assert_eq!(origin("en:ghee"), Origin::ManualProxy);
    assert_eq!(origin("en:yuzu"), Origin::ManualEntry);
    assert_eq!(origin("en:tonka"), Origin::ManualEntry);
    assert_eq!(origin("en:dust"), Origin::None);

    assert_eq!(
        graph.get("en:fruit").unwrap().codes(CodeSource::Primary),
        ["13000", "13004", "13039"]
    );
    assert_eq!(
        graph.get("en:yuzu").unwrap().codes(CodeSource::Secondary),
        ["4521"]
    );

    assert_eq!(output.summary.nodes, 11);
    assert_eq!(output.summary.unresolved(), 1);
    assert_eq!(output.summary.by_origin[&Origin::ParentsChildrenProxy], 4);
    assert_eq!(output.propagation.len(), 2);
    assert!(output.propagation.iter().all(|p| p.converged()));
}

#[test]
fn test_records_merge_bounds_per_code() {
    let (_temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();
    let records = &output.records;

    assert_eq!(records.len(), 9);
    assert!(!records.contains_key("en:tonka"));
    assert!(!records.contains_key("en:dust"));

    let lemon = &records["en:lemon"];
    assert_eq!(lemon.nutriments["proteins"], bounds(15.0, 8.0, 22.0));
    assert_eq!(lemon.nutriments["fat"], bounds(0.3, 0.3, 0.3));
    assert_eq!(lemon.nutritional_data_sources.len(), 2);
    assert!(lemon.environmental_impact_data_sources.is_none());

    // Retired code 26132 reads the record of 26210, capped at 100.
    let tuna = &records["en:tuna"];
    assert_eq!(tuna.nutriments["proteins"], bounds(25.0, 25.0, 100.0));
    assert_eq!(tuna.nutritional_data_sources[0].entry, "Tuna, canned");

    let apple = &records["en:apple"];
    assert_eq!(apple.nutriments["energy-kcal"], bounds(54.0, 54.0, 54.0));
    let impacts = apple.environmental_impact_data_sources.as_ref().unwrap();
    assert_eq!(impacts[0].entry, "Apple, conventional, at farm gate");

    let yuzu = &records["en:yuzu"];
    assert_eq!(yuzu.nutriments["fiber"], bounds(5.0, 3.0, 7.0));
    assert_eq!(yuzu.nutriments["sugars"], bounds(2.0, 2.0, 2.0));
    assert_eq!(yuzu.nutritional_data_sources[0].database, "fcen");
}

#[test]
fn test_raw_proxy_borrows_nutrients_and_impacts() {
    let (_temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();

    let ghee = &output.records["en:ghee"];
    assert_eq!(ghee.nutriments["fat"], bounds(82.0, 80.0, 84.0));
    assert_eq!(ghee.nutritional_data_sources[0].database, "proxy");
    assert_eq!(ghee.nutritional_data_sources[0].origin, Origin::ManualProxy);
    assert_eq!(
        ghee.environmental_impact_data_sources.as_ref().unwrap()[0].entry,
        "en:butter"
    );
    assert_eq!(ghee.extra["impacts"]["co2"], 9.1);
}

#[test]
fn test_merged_records_keep_existing_fields() {
    let (_temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();
    let merged = pipeline.merged_records(&output).unwrap();

    // Nine enriched records plus the untouched en:butter.
    assert_eq!(merged.len(), 10);
    let apple = merged.get("en:apple").unwrap();
    assert_eq!(apple["ciqual_proxy_food_code"], "13000");
    assert!(apple.contains_key("nutriments"));
    assert_eq!(apple["id"], "en:apple");

    let butter = merged.get("en:butter").unwrap();
    assert!(!butter.contains_key("nutritional_data_sources"));
}

#[test]
fn test_unknown_rows_are_diagnostics_not_errors() {
    let (_temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();

    assert!(output.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnknownIngredient { id, .. } if id == "en:unknown-root"
    )));
    assert!(!output.graph.contains("en:unknown-root"));
    assert_eq!(output.diagnostics.warnings().count(), 0);
}

#[test]
fn test_mapping_report_csv() {
    let (temp_dir, pipeline) = run_fixture("");
    let output = pipeline.run().unwrap();
    let report_path = temp_dir.path().join("report.csv");
    pipeline
        .mapping_report(&output)
        .write_csv_path(&report_path)
        .unwrap();

    let content = std::fs::read_to_string(&report_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "OFF_ID;ORIGIN;CODE_NUTRI;NAME_NUTRI;CODE_IMPACT;NAME_IMPACT;MANUAL_TEXT;COMMENT"
    );
    assert_eq!(lines.len(), 12);
    assert!(lines.contains(
        &"en:apple;direct;13000;Apple, raw;13000;Apple, conventional, at farm gate;;"
    ));
    assert!(lines.contains(&"en:tuna;direct;26210;Tuna, canned;;;;"));
    assert!(lines.contains(&"en:lemon;own_mapping;13004|13039;Lemon, raw|Lime, raw;;;;"));
    assert!(lines.contains(&"en:yuzu;manual_entry;4521;Yuzu, raw;;;;fcen"));
    assert!(lines.contains(&"en:tonka;manual_entry;;;;;see supplier sheet;supplier"));
    assert!(lines.contains(&"en:dust;no_reference;;;;;;"));
}

#[test]
fn test_secondary_tiers_disabled_by_config() {
    let (_temp_dir, pipeline) = run_fixture("[linking]\nuse_secondary = false\n");
    let output = pipeline.run().unwrap();

    assert_eq!(output.graph.get("en:yuzu").unwrap().origin, Origin::None);
    assert!(!output.records.contains_key("en:yuzu"));
    assert_eq!(output.propagation.len(), 1);
}

#[test]
fn test_audit_compares_embedded_codes() {
    let (_temp_dir, pipeline) = run_fixture("");
    let entries = pipeline.audit();

    let apple = entries.iter().find(|e| e.id == "en:apple").unwrap();
    assert_eq!(apple.embedded_code, "13000");
    assert_eq!(apple.status, AuditStatus::Differs);
    assert!(entries.iter().all(|e| e.id != "en:lemon"));
}

#[test]
fn test_missing_config_is_not_found() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let err = TomlConfigProvider::new(temp_dir.path().join("absent.toml"))
        .load()
        .unwrap_err();
    assert!(matches!(err, TaxomapError::NotFound(_)));
}

#[test]
fn test_link_table_without_code_column_is_fatal() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_fixture(&temp_dir, "");
    std::fs::write(
        temp_dir.path().join("ciqual_links.csv"),
        "OFF_ID,SOMETHING_ELSE\nen:lemon,13004\n",
    )
    .unwrap();

    let config = TomlConfigProvider::new(config_path).load().unwrap();
    let err = Pipeline::from_config(config).err().unwrap();
    assert!(matches!(err, TaxomapError::Table { .. }));
}

#[test]
fn test_missing_existing_records_start_empty() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_fixture(&temp_dir, "");
    std::fs::remove_file(temp_dir.path().join("ingredients_data.json")).unwrap();

    let config = TomlConfigProvider::new(config_path).load().unwrap();
    let pipeline = Pipeline::from_config(config).unwrap();
    let output = pipeline.run().unwrap();

    // Without raw data the ghee proxy has nothing to borrow.
    assert_eq!(output.graph.get("en:ghee").unwrap().origin, Origin::None);
    assert!(output
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::UnresolvedProxy { id, .. } if id == "en:ghee")));
    assert_eq!(
        pipeline.inputs().tables.links(CodeSource::Primary).len(),
        3
    );
}
