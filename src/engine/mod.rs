use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    catalog::{ResourceType, TileCatalog, TileDefinition},
    colony::{ColonyConfig, ColonyState},
    error::ColonyError,
    grid::{GridPosition, PlacedTile},
    ledger::ResourceChange,
    placement,
    rng::{RngManager, SystemRng, EXPLORE_STREAM, MAPGEN_STREAM},
    save::{from_save_record, to_save_record, SaveRecord},
    transport::SaveQueue,
};

pub struct EngineSettings {
    pub colony_name: String,
    pub seed: u64,
}

/// How a session starts: a fresh map, or hydrated from an earlier save.
#[derive(Debug, Clone, Default)]
pub struct LaunchContext {
    pub new_game: bool,
    pub save_record: Option<SaveRecord>,
}

impl LaunchContext {
    pub fn new_game() -> Self {
        Self {
            new_game: true,
            save_record: None,
        }
    }

    pub fn resume(record: Option<SaveRecord>) -> Self {
        Self {
            new_game: false,
            save_record: record,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    catalog: Arc<TileCatalog>,
    config: ColonyConfig,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, catalog: Arc<TileCatalog>, config: ColonyConfig) -> Self {
        Self {
            settings,
            catalog,
            config,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Creates the colony described by `launch`. A save naming a tile the
    /// catalog no longer has is discarded in favour of a new colony.
    pub fn build(self, launch: LaunchContext) -> Result<Engine, ColonyError> {
        let mut rng = RngManager::new(self.settings.seed);
        let record = launch.save_record.as_ref().filter(|_| !launch.new_game);
        let colony = hydrate(
            record,
            &self.catalog,
            &self.config,
            &self.settings.colony_name,
            &mut rng,
        )?;
        info!(
            colony = %self.settings.colony_name,
            seed = self.settings.seed,
            tiles = colony.grid.len(),
            "colony ready"
        );

        Ok(Engine {
            rng,
            systems: self.systems,
            saves: SaveQueue::new(),
            colony,
            catalog: self.catalog,
            config: self.config,
            settings: self.settings,
            tick: 0,
        })
    }
}

fn hydrate(
    record: Option<&SaveRecord>,
    catalog: &TileCatalog,
    config: &ColonyConfig,
    colony_name: &str,
    rng: &mut RngManager,
) -> Result<ColonyState, ColonyError> {
    let mut stream = rng.stream(MAPGEN_STREAM);
    let Some(record) = record else {
        return Ok(ColonyState::generate(catalog, config, &mut stream)?.0);
    };
    match from_save_record(record, catalog, config, &mut stream) {
        Err(ColonyError::UnknownTile(name)) => {
            warn!(
                colony = %colony_name,
                tile = %name,
                "save references an unknown tile, starting a new colony"
            );
            Ok(ColonyState::generate(catalog, config, &mut stream)?.0)
        }
        restored => restored,
    }
}

/// What happened during one call to [`Engine::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub produced: bool,
    pub autosave_queued: bool,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    saves: SaveQueue,
    colony: ColonyState,
    catalog: Arc<TileCatalog>,
    config: ColonyConfig,
    settings: EngineSettings,
    tick: u64,
}

impl Engine {
    /// Runs every system once with the given wall-clock delta.
    pub fn advance(&mut self, elapsed_secs: f64) -> Result<TickReport> {
        self.tick += 1;
        let mut ctx = SystemContext {
            tick: self.tick,
            elapsed_secs,
            autosave_interval_secs: self.config.autosave_interval_secs,
            colony_name: &self.settings.colony_name,
            produced: false,
            autosave_due: false,
        };
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            system
                .run(&mut ctx, &mut self.colony, &mut rng_stream)
                .with_context(|| format!("system {} failed on tick {}", system.name(), ctx.tick))?;
        }
        let report = TickReport {
            tick: self.tick,
            produced: ctx.produced,
            autosave_queued: ctx.autosave_due,
        };
        if report.autosave_queued {
            self.queue_snapshot();
        }
        Ok(report)
    }

    /// Places a tile on any cell, bypassing replacement rules.
    pub fn place(
        &mut self,
        position: GridPosition,
        tile: &str,
        use_cargo: bool,
    ) -> Result<Option<PlacedTile>, ColonyError> {
        let definition = self.catalog.lookup(tile)?;
        Ok(placement::place_tile(&mut self.colony, position, definition, use_cargo))
    }

    /// Swaps the live colony for one hydrated from `record`. A record naming
    /// an unknown tile starts a new colony, as at launch.
    pub fn load(&mut self, record: &SaveRecord) -> Result<(), ColonyError> {
        self.colony = hydrate(
            Some(record),
            &self.catalog,
            &self.config,
            &self.settings.colony_name,
            &mut self.rng,
        )?;
        Ok(())
    }

    pub fn snapshot(&self) -> SaveRecord {
        to_save_record(&self.colony)
    }

    fn queue_snapshot(&mut self) {
        let mut record = to_save_record(&self.colony);
        record.saved_at = Some(Utc::now());
        let superseded = self.saves.request(record);
        debug!(colony = %self.settings.colony_name, superseded, "save queued");
    }

    pub fn take_pending_save(&mut self) -> Option<SaveRecord> {
        self.saves.take()
    }

    pub fn complete_save(&mut self, success: bool) {
        if !success {
            warn!(colony = %self.settings.colony_name, "save failed");
        }
        self.saves.complete(success);
    }

    pub fn drain_changes(&mut self) -> Vec<ResourceChange> {
        self.colony.ledger.drain_changes()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &PlacedTile> {
        self.colony.grid.iter()
    }

    pub fn frontier(&self) -> BTreeSet<GridPosition> {
        self.colony.grid.frontier()
    }

    pub fn colony(&self) -> &ColonyState {
        &self.colony
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ColonyConfig {
        &self.config
    }

    pub fn colony_name(&self) -> &str {
        &self.settings.colony_name
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}

/// Commands and read-only queries a UI layer needs from a running colony.
pub trait ColonyControls {
    fn explore(&mut self, position: GridPosition) -> Result<Arc<TileDefinition>, ColonyError>;
    fn replace(
        &mut self,
        position: GridPosition,
        tile: &str,
        use_cargo: bool,
    ) -> Result<PlacedTile, ColonyError>;
    fn request_save(&mut self);

    fn resource_amounts(&self) -> BTreeMap<ResourceType, i64>;
    fn resource_capacities(&self) -> BTreeMap<ResourceType, i64>;
    fn resource_rates(&self) -> BTreeMap<ResourceType, i64>;
    fn explore_cost(&self) -> i64;
    fn tile_at(&self, position: GridPosition) -> Option<&PlacedTile>;
    fn replacement_options(
        &self,
        position: GridPosition,
    ) -> Result<Vec<Arc<TileDefinition>>, ColonyError>;
    fn can_afford(&self, tile: &str, use_cargo: bool) -> Result<bool, ColonyError>;
    fn can_explore(&self) -> bool;
}

impl ColonyControls for Engine {
    fn explore(&mut self, position: GridPosition) -> Result<Arc<TileDefinition>, ColonyError> {
        let mut stream = self.rng.stream(EXPLORE_STREAM);
        placement::explore(&mut self.colony, &self.catalog, position, &mut stream)
    }

    fn replace(
        &mut self,
        position: GridPosition,
        tile: &str,
        use_cargo: bool,
    ) -> Result<PlacedTile, ColonyError> {
        let definition = self.catalog.lookup(tile)?;
        placement::replace(&mut self.colony, &self.catalog, position, definition, use_cargo)
    }

    fn request_save(&mut self) {
        self.queue_snapshot();
    }

    fn resource_amounts(&self) -> BTreeMap<ResourceType, i64> {
        self.colony.ledger.amounts()
    }

    fn resource_capacities(&self) -> BTreeMap<ResourceType, i64> {
        self.colony.ledger.capacities()
    }

    fn resource_rates(&self) -> BTreeMap<ResourceType, i64> {
        self.colony.ledger.rates()
    }

    fn explore_cost(&self) -> i64 {
        self.colony.explore_cost()
    }

    fn tile_at(&self, position: GridPosition) -> Option<&PlacedTile> {
        self.colony.grid.get(position)
    }

    fn replacement_options(
        &self,
        position: GridPosition,
    ) -> Result<Vec<Arc<TileDefinition>>, ColonyError> {
        let tile = self
            .colony
            .grid
            .get(position)
            .ok_or(ColonyError::NotOccupied(position))?;
        self.catalog.replacement_options(&tile.definition)
    }

    fn can_afford(&self, tile: &str, use_cargo: bool) -> Result<bool, ColonyError> {
        let definition = self.catalog.lookup(tile)?;
        Ok(placement::can_afford(&self.colony.ledger, &definition, use_cargo))
    }

    fn can_explore(&self) -> bool {
        placement::can_explore(&self.colony)
    }
}

/// Per-tick input handed to each system, plus flags systems raise for the engine.
pub struct SystemContext<'a> {
    pub tick: u64,
    pub elapsed_secs: f64,
    pub autosave_interval_secs: f64,
    pub colony_name: &'a str,
    pub produced: bool,
    pub autosave_due: bool,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &mut SystemContext<'_>,
        colony: &mut ColonyState,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
