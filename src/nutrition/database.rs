//! Reference databases a run reads from, loaded once and shared read-only by the loader and the
//! aggregator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fs, path::Path};

use crate::{error::TaxomapError, properties::substitute_code};

/// Nutrient field of a primary-database record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryNutrient {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryRecord {
    #[serde(rename = "alim_nom_eng", default)]
    pub name: String,
    #[serde(default)]
    pub nutriments: BTreeMap<String, PrimaryNutrient>,
}

/// Nutrient field of a secondary-database record. A null `stdev` reads as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryNutrient {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub stdev: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRecord {
    #[serde(rename = "FoodDescription", default)]
    pub name: String,
    #[serde(default)]
    pub nutriments: BTreeMap<String, SecondaryNutrient>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub ciqual_code: String,
    #[serde(rename = "LCI_name", default)]
    pub name: Option<String>,
}

fn read_json(path: &Path) -> Result<String, TaxomapError> {
    tracing::debug!("Reading {}", path.display());
    Ok(fs::read_to_string(path)?)
}

/// Primary nutrient database keyed by code, with a reverse index from entry name to code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryDatabase {
    records: BTreeMap<String, PrimaryRecord>,
    by_name: BTreeMap<String, String>,
}

impl PrimaryDatabase {
    pub fn new(records: BTreeMap<String, PrimaryRecord>) -> Self {
        let by_name = records
            .iter()
            .filter(|(_, record)| !record.name.is_empty())
            .map(|(code, record)| (record.name.clone(), code.clone()))
            .collect();
        PrimaryDatabase { records, by_name }
    }

    pub fn from_json_str(content: &str) -> Result<Self, TaxomapError> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_json_str(&read_json(path.as_ref())?)
    }

    /// Record for `code`, after stale-code substitution.
    pub fn get(&self, code: &str) -> Option<&PrimaryRecord> {
        self.records.get(substitute_code(code))
    }

    /// Code of the entry whose English name is exactly `name`.
    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondaryDatabase {
    records: BTreeMap<String, SecondaryRecord>,
}

impl SecondaryDatabase {
    pub fn new(records: BTreeMap<String, SecondaryRecord>) -> Self {
        SecondaryDatabase { records }
    }

    pub fn from_json_str(content: &str) -> Result<Self, TaxomapError> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_json_str(&read_json(path.as_ref())?)
    }

    pub fn get(&self, code: &str) -> Option<&SecondaryRecord> {
        self.records.get(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Environmental-impact entries keyed by the primary code they describe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactDatabase {
    by_code: BTreeMap<String, ImpactRecord>,
}

impl ImpactDatabase {
    pub fn new(records: Vec<ImpactRecord>) -> Self {
        let by_code = records
            .into_iter()
            .map(|record| (record.ciqual_code.clone(), record))
            .collect();
        ImpactDatabase { by_code }
    }

    pub fn from_json_str(content: &str) -> Result<Self, TaxomapError> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_json_str(&read_json(path.as_ref())?)
    }

    pub fn get(&self, code: &str) -> Option<&ImpactRecord> {
        self.by_code.get(substitute_code(code))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Ingredient records produced by earlier runs or other tools. Kept as raw JSON objects so
/// fields this crate does not know about survive a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExistingIngredients {
    records: BTreeMap<String, Map<String, Value>>,
}

impl ExistingIngredients {
    pub const NUTRIMENTS: &'static str = "nutriments";
    pub const IMPACTS: &'static str = "impacts";

    pub fn from_json_str(content: &str) -> Result<Self, TaxomapError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_json_str(&read_json(path.as_ref())?)
    }

    pub fn get(&self, id: &str) -> Option<&Map<String, Value>> {
        self.records.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, record: Map<String, Value>) {
        self.records.insert(id.into(), record);
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Map<String, Value>> {
        self.records.get_mut(id)
    }

    pub fn entry_or_new(&mut self, id: &str) -> &mut Map<String, Value> {
        self.records.entry(id.to_string()).or_insert_with(|| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::String(id.to_string()));
            record
        })
    }

    /// Record id as stored in the record itself, falling back to its key.
    pub fn record_id<'a>(&'a self, key: &'a str) -> &'a str {
        self.records
            .get(key)
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .unwrap_or(key)
    }

    pub fn has_nutriments(&self, id: &str) -> bool {
        self.get(id)
            .and_then(|r| r.get(Self::NUTRIMENTS))
            .is_some_and(|v| !v.is_null())
    }

    pub fn has_impacts(&self, id: &str) -> bool {
        self.get(id)
            .and_then(|r| r.get(Self::IMPACTS))
            .is_some_and(|v| !v.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, Map<String, Value>> {
        self.records
    }
}

/// Every reference dataset of one run. Absent optional databases are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub primary: PrimaryDatabase,
    pub secondary: SecondaryDatabase,
    pub impacts: ImpactDatabase,
    pub existing: ExistingIngredients,
}
