use std::collections::BTreeMap;

use rand::Rng;

use crate::catalog::{ResourceType, TileCatalog};
use crate::error::ColonyError;
use crate::grid::Grid;
use crate::ledger::{ResourceLedger, DEFAULT_PRODUCTION_INTERVAL_SECS};
use crate::mapgen::{self, MapConfig, SeedingReport};

pub const DEFAULT_EXPLORE_BASE_COST: i64 = 5;
pub const DEFAULT_EXPLORE_MAX_COST: i64 = 100;
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: f64 = 30.0;

/// Tunables for a colony session, resolved from the scenario file.
#[derive(Debug, Clone, PartialEq)]
pub struct ColonyConfig {
    pub starting_capacities: BTreeMap<ResourceType, i64>,
    pub production_interval_secs: f64,
    pub autosave_interval_secs: f64,
    pub explore_base_cost: i64,
    pub explore_max_cost: i64,
    pub map: MapConfig,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            starting_capacities: ResourceType::ALL.iter().map(|r| (*r, 100)).collect(),
            production_interval_secs: DEFAULT_PRODUCTION_INTERVAL_SECS,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            explore_base_cost: DEFAULT_EXPLORE_BASE_COST,
            explore_max_cost: DEFAULT_EXPLORE_MAX_COST,
            map: MapConfig::default(),
        }
    }
}

/// Root state of one play session.
#[derive(Debug, Clone)]
pub struct ColonyState {
    pub grid: Grid,
    pub ledger: ResourceLedger,
    explore_cost: i64,
    explore_max_cost: i64,
    save_timer: f64,
}

impl ColonyState {
    /// Empty grid with a full ledger; no tiles placed yet.
    pub fn empty(config: &ColonyConfig) -> Self {
        let mut ledger = ResourceLedger::new(config.production_interval_secs);
        ledger.initialize(&config.starting_capacities);
        Self {
            grid: Grid::new(),
            ledger,
            explore_cost: config.explore_base_cost,
            explore_max_cost: config.explore_max_cost.max(config.explore_base_cost),
            save_timer: 0.0,
        }
    }

    /// Fresh colony with a generated map.
    pub fn generate<R: Rng + ?Sized>(
        catalog: &TileCatalog,
        config: &ColonyConfig,
        rng: &mut R,
    ) -> Result<(Self, SeedingReport), ColonyError> {
        let mut colony = Self::empty(config);
        let report = mapgen::generate_colony(&mut colony.grid, catalog, rng, &config.map)?;
        Ok((colony, report))
    }

    pub fn explore_cost(&self) -> i64 {
        self.explore_cost
    }

    pub fn explore_max_cost(&self) -> i64 {
        self.explore_max_cost
    }

    pub(crate) fn set_explore_cost(&mut self, cost: i64) {
        self.explore_cost = cost.min(self.explore_max_cost);
    }

    /// Raises the explore cost by one, stopping at the ceiling.
    pub(crate) fn bump_explore_cost(&mut self) {
        if self.explore_cost < self.explore_max_cost {
            self.explore_cost += 1;
        }
    }

    pub fn save_timer(&self) -> f64 {
        self.save_timer
    }

    /// Accumulates save-timer progress; true once per completed interval.
    pub fn advance_save_timer(&mut self, elapsed_secs: f64, interval_secs: f64) -> bool {
        if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 || interval_secs <= 0.0 {
            return false;
        }
        self.save_timer += elapsed_secs;
        if self.save_timer < interval_secs {
            return false;
        }
        self.save_timer = 0.0;
        true
    }
}
