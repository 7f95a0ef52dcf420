//! Configuration of a linking run.
//!
//! A run is described by a TOML document:
//!
//! ```toml
//! [inputs]
//! taxonomy = "ingredients.json"
//! primary_links = "ciqual_links.csv"
//! primary_database = "ciqual.json"
//! secondary_links = "fcen_links.csv"
//! secondary_database = "fcen.json"
//! proxies = "duplicates.csv"
//! manual_entries = "manual_sources.csv"
//! impact_database = "agribalyse.json"
//! existing_ingredients = "ingredients_data.json"
//!
//! [linking]
//! use_secondary = true
//!
//! [propagation]
//! max_passes = 1000
//! ```
//!
//! Relative input paths are resolved against the directory holding the configuration file.

use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

use crate::{error::TaxomapError, propagation::DEFAULT_MAX_PASSES};

pub const DEFAULT_ENERGY_FIELD: &str = "energy-kcal";
pub const DEFAULT_PERCENTAGE_CAP: f64 = 100.0;

fn default_true() -> bool {
    true
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

fn default_energy_field() -> String {
    DEFAULT_ENERGY_FIELD.to_string()
}

fn default_percentage_cap() -> f64 {
    DEFAULT_PERCENTAGE_CAP
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPaths {
    pub taxonomy: PathBuf,
    pub primary_links: PathBuf,
    pub primary_database: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_links: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxies: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_entries: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_ingredients: Option<PathBuf>,
}

impl InputPaths {
    pub fn new(
        taxonomy: impl Into<PathBuf>,
        primary_links: impl Into<PathBuf>,
        primary_database: impl Into<PathBuf>,
    ) -> Self {
        InputPaths {
            taxonomy: taxonomy.into(),
            primary_links: primary_links.into(),
            primary_database: primary_database.into(),
            secondary_links: None,
            secondary_database: None,
            proxies: None,
            manual_entries: None,
            impact_database: None,
            existing_ingredients: None,
        }
    }

    fn resolve_against(&mut self, base: &Path) {
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        join(&mut self.taxonomy);
        join(&mut self.primary_links);
        join(&mut self.primary_database);
        for path in [
            &mut self.secondary_links,
            &mut self.secondary_database,
            &mut self.proxies,
            &mut self.manual_entries,
            &mut self.impact_database,
            &mut self.existing_ingredients,
        ]
        .into_iter()
        .flatten()
        {
            join(path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Reject entries that lack a `parents` or `children` field instead of reading them as empty.
    #[serde(default = "default_true")]
    pub require_relation_fields: bool,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        TaxonomyConfig {
            require_relation_fields: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkingConfig {
    /// Run the secondary link tier and its propagation.
    #[serde(default = "default_true")]
    pub use_secondary: bool,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        LinkingConfig {
            use_secondary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationConfig {
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
    #[serde(default)]
    pub fail_on_convergence_limit: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            max_passes: DEFAULT_MAX_PASSES,
            fail_on_convergence_limit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionConfig {
    /// Field exempt from the percentage cap.
    #[serde(default = "default_energy_field")]
    pub energy_field: String,
    #[serde(default = "default_percentage_cap")]
    pub percentage_cap: f64,
}

impl Default for NutritionConfig {
    fn default() -> Self {
        NutritionConfig {
            energy_field: DEFAULT_ENERGY_FIELD.to_string(),
            percentage_cap: DEFAULT_PERCENTAGE_CAP,
        }
    }
}

impl NutritionConfig {
    /// Upper bound for `field`, capped unless it is the energy field.
    pub fn cap(&self, field: &str, max: f64) -> f64 {
        if field == self.energy_field {
            max
        } else {
            max.min(self.percentage_cap)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub inputs: InputPaths,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub linking: LinkingConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub nutrition: NutritionConfig,
}

impl PipelineConfig {
    pub fn new(inputs: InputPaths) -> Self {
        PipelineConfig {
            inputs,
            taxonomy: TaxonomyConfig::default(),
            linking: LinkingConfig::default(),
            propagation: PropagationConfig::default(),
            nutrition: NutritionConfig::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TaxomapError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TaxomapError> {
        if self.propagation.max_passes == 0 {
            return Err(TaxomapError::Config(
                "propagation.max_passes must be at least 1".to_string(),
            ));
        }
        if !self.nutrition.percentage_cap.is_finite() || self.nutrition.percentage_cap <= 0.0 {
            return Err(TaxomapError::Config(format!(
                "nutrition.percentage_cap must be a positive number, got {}",
                self.nutrition.percentage_cap
            )));
        }
        if self.nutrition.energy_field.trim().is_empty() {
            return Err(TaxomapError::Config(
                "nutrition.energy_field must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a run's configuration comes from.
pub trait ConfigProvider {
    fn load(&self) -> Result<PipelineConfig, TaxomapError>;
    fn store(&self, config: &PipelineConfig) -> Result<(), TaxomapError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn load(&self) -> Result<PipelineConfig, TaxomapError> {
        tracing::debug!("Attempting to read pipeline config from: {:?}", &self.path);
        if !self.path.exists() {
            return Err(TaxomapError::NotFound(format!(
                "config file {} does not exist",
                self.path.display()
            )));
        }
        let content = read_to_string(&self.path)?;
        let mut config = PipelineConfig::from_toml_str(&content)?;
        if let Some(base) = self.path.parent() {
            config.inputs.resolve_against(base);
        }
        Ok(config)
    }

    fn store(&self, config: &PipelineConfig) -> Result<(), TaxomapError> {
        tracing::debug!("Attempting to write pipeline config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, TaxomapError> {
    tracing::debug!("Reading {:?}", path.as_ref());
    Ok(read_to_string(path)?)
}
