use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::{
    catalog::{ResourceType, TileCatalog, TileDefinition},
    colony::{
        ColonyConfig, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_EXPLORE_BASE_COST,
        DEFAULT_EXPLORE_MAX_COST,
    },
    engine::{EngineBuilder, EngineSettings},
    ledger::DEFAULT_PRODUCTION_INTERVAL_SECS,
    mapgen::MapConfig,
    systems::{AutosaveSystem, ProductionSystem},
};

fn default_production_interval_secs() -> f64 {
    DEFAULT_PRODUCTION_INTERVAL_SECS
}

fn default_autosave_interval_secs() -> f64 {
    DEFAULT_AUTOSAVE_INTERVAL_SECS
}

fn default_explore_base_cost() -> i64 {
    DEFAULT_EXPLORE_BASE_COST
}

fn default_explore_max_cost() -> i64 {
    DEFAULT_EXPLORE_MAX_COST
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_production_interval_secs")]
    pub production_interval_secs: f64,
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: f64,
    #[serde(default)]
    pub explore: ExploreSettings,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub starting_capacities: BTreeMap<ResourceType, i64>,
    pub tiles: Vec<TileDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExploreSettings {
    #[serde(default = "default_explore_base_cost")]
    pub base_cost: i64,
    #[serde(default = "default_explore_max_cost")]
    pub max_cost: i64,
}

impl Default for ExploreSettings {
    fn default() -> Self {
        Self {
            base_cost: default_explore_base_cost(),
            max_cost: default_explore_max_cost(),
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn build_catalog(&self) -> Result<TileCatalog> {
        TileCatalog::new(self.tiles.iter().cloned())
            .with_context(|| format!("Invalid tile catalog in scenario '{}'", self.name))
    }

    /// Resources missing from `starting_capacities` start at zero.
    pub fn colony_config(&self) -> ColonyConfig {
        ColonyConfig {
            starting_capacities: self.starting_capacities.clone(),
            production_interval_secs: self.production_interval_secs,
            autosave_interval_secs: self.autosave_interval_secs,
            explore_base_cost: self.explore.base_cost,
            explore_max_cost: self.explore.max_cost,
            map: self.map.clone(),
        }
    }

    /// Engine wired with the standard per-tick systems for this scenario.
    pub fn engine_builder(&self) -> Result<EngineBuilder> {
        let catalog = Arc::new(self.build_catalog()?);
        info!(
            scenario = %self.name,
            tiles = catalog.len(),
            kinds = ?catalog.kind_counts(),
            "tile catalog loaded"
        );
        let settings = EngineSettings {
            colony_name: self.name.clone(),
            seed: self.seed,
        };
        Ok(EngineBuilder::new(settings, catalog, self.colony_config())
            .with_system(ProductionSystem::new())
            .with_system(AutosaveSystem::new()))
    }
}
