//! Initial colony layout: the ring silhouette and randomized terrain seeding.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{TileCatalog, TileDefinition, TileKind, TileTag};
use crate::error::ColonyError;
use crate::grid::{Grid, GridPosition};

fn default_ring_size() -> u32 {
    3
}

fn default_headquarters() -> String {
    "Headquarters".to_string()
}

fn default_base_tile() -> String {
    "Dirt".to_string()
}

fn default_scan_probability() -> f64 {
    0.3
}

fn default_scans() -> u32 {
    2
}

fn default_max_passes() -> u32 {
    10
}

fn default_min_tagged() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedingParams {
    #[serde(default = "default_scan_probability")]
    pub scan_probability: f64,
    #[serde(default = "default_scans")]
    pub scans: u32,
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
    #[serde(default = "default_min_tagged")]
    pub min_trees: u32,
    #[serde(default = "default_min_tagged")]
    pub min_crystals: u32,
}

impl Default for SeedingParams {
    fn default() -> Self {
        Self {
            scan_probability: default_scan_probability(),
            scans: default_scans(),
            max_passes: default_max_passes(),
            min_trees: default_min_tagged(),
            min_crystals: default_min_tagged(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_ring_size")]
    pub ring_size: u32,
    #[serde(default = "default_headquarters")]
    pub headquarters: String,
    #[serde(default = "default_base_tile")]
    pub base_tile: String,
    #[serde(default)]
    pub seeding: SeedingParams,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            ring_size: default_ring_size(),
            headquarters: default_headquarters(),
            base_tile: default_base_tile(),
            seeding: SeedingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedingReport {
    pub passes: u32,
    pub trees: u32,
    pub crystals: u32,
}

/// Inclusive x-range of row `y` for a ring layout of the given size.
pub fn row_bounds(size: i32, y: i32) -> (i32, i32) {
    let dy = y.abs();
    let start = -(size - dy / 2);
    let end = size - (dy + 1) / 2;
    (start, end)
}

/// Lays `base` over the hex-shaped ring area, leaving the origin free.
pub fn place_rings(grid: &mut Grid, size: u32, base: &Arc<TileDefinition>) -> usize {
    let size = i32::try_from(size).unwrap_or(i32::MAX / 4);
    let mut placed = 0;
    for y in -size..=size {
        let (start, end) = row_bounds(size, y);
        for x in start..=end {
            let position = GridPosition::new(x, y);
            if position.is_origin() {
                continue;
            }
            grid.place(position, Arc::clone(base));
            placed += 1;
        }
    }
    placed
}

/// Picks a terrain or resource definition with even odds between the two
/// pools, falling back to whichever pool is non-empty.
pub fn choose_wild_tile<R: Rng + ?Sized>(
    catalog: &TileCatalog,
    rng: &mut R,
) -> Option<Arc<TileDefinition>> {
    let terrain = catalog.by_kind(TileKind::Terrain);
    let resources = catalog.by_kind(TileKind::Resource);
    let (first, second) = if rng.gen_bool(0.5) {
        (terrain, resources)
    } else {
        (resources, terrain)
    };
    let pool = if first.is_empty() { second } else { first };
    pool.choose(rng).cloned()
}

/// Randomly converts ring tiles into terrain and resource tiles, retrying until
/// enough tree and crystal tiles exist or the pass budget runs out.
pub fn seed_terrain<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &TileCatalog,
    rng: &mut R,
    params: &SeedingParams,
) -> SeedingReport {
    let mut report = SeedingReport::default();
    let probability = params.scan_probability.clamp(0.0, 1.0);

    while report.passes < params.max_passes {
        report.passes += 1;
        let positions: Vec<GridPosition> = grid
            .occupied_positions()
            .into_iter()
            .filter(|position| !position.is_origin())
            .collect();

        let mut candidates = BTreeSet::new();
        for _ in 0..params.scans {
            for position in &positions {
                if rng.gen_bool(probability) {
                    candidates.insert(*position);
                }
            }
        }

        for position in candidates {
            let already_resource = grid
                .get(position)
                .map(|tile| tile.definition.kind == TileKind::Resource)
                .unwrap_or(false);
            if already_resource {
                continue;
            }
            let Some(definition) = choose_wild_tile(catalog, rng) else {
                return report;
            };
            match definition.tag {
                Some(TileTag::Trees) => report.trees += 1,
                Some(TileTag::Crystals) => report.crystals += 1,
                None => {}
            }
            grid.place(position, definition);
        }

        if report.trees >= params.min_trees && report.crystals >= params.min_crystals {
            return report;
        }
    }

    debug!(
        passes = report.passes,
        trees = report.trees,
        crystals = report.crystals,
        "seeding finished below target"
    );
    report
}

/// Builds a fresh colony map: headquarters at the origin, rings of base tiles
/// around it, then procedural seeding.
pub fn generate_colony<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &TileCatalog,
    rng: &mut R,
    config: &MapConfig,
) -> Result<SeedingReport, ColonyError> {
    let headquarters = catalog.lookup(&config.headquarters)?;
    let base = catalog.lookup(&config.base_tile)?;
    grid.place(GridPosition::ORIGIN, headquarters);
    let ring_tiles = place_rings(grid, config.ring_size, &base);
    let report = seed_terrain(grid, catalog, rng, &config.seeding);
    info!(
        ring_tiles,
        passes = report.passes,
        trees = report.trees,
        crystals = report.crystals,
        "generated colony map"
    );
    Ok(report)
}
