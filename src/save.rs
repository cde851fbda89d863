//! Conversion between a live colony and its serializable save record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{ResourceType, TileCatalog};
use crate::colony::{ColonyConfig, ColonyState};
use crate::error::ColonyError;
use crate::grid::GridPosition;
use crate::placement::restore_tile;

/// Save format changelog:
/// 0: resource amounts stored positionally in `resource_amounts`
/// 1: resource amounts keyed by resource name in `resources`
/// 2: ledger capacities and rates stored in `capacities` and `rates`
pub const SAVE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTile {
    pub name: String,
    pub position: GridPosition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub tiles: Vec<SavedTile>,
    #[serde(default)]
    pub explore_cost: i64,
    #[serde(default)]
    pub resources: BTreeMap<ResourceType, i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_amounts: Vec<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacities: BTreeMap<ResourceType, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rates: BTreeMap<ResourceType, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SaveRecord {
    /// Amount of every resource, reading the positional list for legacy
    /// records. Resources the record leaves out count as empty.
    pub fn amounts(&self) -> BTreeMap<ResourceType, i64> {
        let legacy = self.version == 0 && self.resources.is_empty();
        ResourceType::ALL
            .iter()
            .enumerate()
            .map(|(index, resource)| {
                let amount = if legacy {
                    self.resource_amounts.get(index)
                } else {
                    self.resources.get(resource)
                };
                (*resource, amount.copied().unwrap_or(0))
            })
            .collect()
    }

    /// Whether capacities and rates were stored rather than derived from tiles.
    pub fn stores_ledger(&self) -> bool {
        self.version >= 2
    }
}

pub fn to_save_record(colony: &ColonyState) -> SaveRecord {
    SaveRecord {
        version: SAVE_VERSION,
        tiles: colony
            .grid
            .iter()
            .map(|tile| SavedTile {
                name: tile.name().to_string(),
                position: tile.position,
            })
            .collect(),
        explore_cost: colony.explore_cost(),
        resources: colony.ledger.amounts(),
        resource_amounts: Vec::new(),
        capacities: colony.ledger.capacities(),
        rates: colony.ledger.rates(),
        saved_at: None,
    }
}

/// Rebuilds a colony from a record. An empty record starts a new colony; an
/// unknown tile name aborts without returning partial state. Records older
/// than version 2 rebuild capacities and rates from their tiles.
pub fn from_save_record<R: Rng + ?Sized>(
    record: &SaveRecord,
    catalog: &TileCatalog,
    config: &ColonyConfig,
    rng: &mut R,
) -> Result<ColonyState, ColonyError> {
    if record.tiles.is_empty() {
        let (colony, _) = ColonyState::generate(catalog, config, rng)?;
        return Ok(colony);
    }

    let mut colony = ColonyState::empty(config);
    for tile in &record.tiles {
        let definition = catalog.lookup(&tile.name)?;
        if record.stores_ledger() {
            colony.grid.place(tile.position, definition);
        } else {
            restore_tile(&mut colony, tile.position, definition);
        }
    }
    if record.stores_ledger() {
        for resource in ResourceType::ALL {
            let capacity = record.capacities.get(&resource).copied().unwrap_or(0);
            let rate = record.rates.get(&resource).copied().unwrap_or(0);
            colony.ledger.set_capacity(resource, capacity);
            colony.ledger.set_rate(resource, rate);
        }
    }
    colony.set_explore_cost(record.explore_cost.max(config.explore_base_cost));
    for (resource, amount) in record.amounts() {
        colony.ledger.set_amount(resource, amount);
    }
    info!(
        version = record.version,
        tiles = record.tiles.len(),
        explore_cost = colony.explore_cost(),
        "restored colony from save"
    );
    Ok(colony)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{TileDefinition, TileKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog() -> TileCatalog {
        TileCatalog::new(vec![
            TileDefinition::new("Headquarters", TileKind::Headquarters),
            TileDefinition::new("Dirt", TileKind::Terrain),
            TileDefinition::storage("Warehouse", ResourceType::Wood, 50),
            TileDefinition::production("Lumberyard", ResourceType::Wood, 2),
        ])
        .unwrap()
    }

    fn record(names: &[&str]) -> SaveRecord {
        SaveRecord {
            version: 1,
            tiles: names
                .iter()
                .enumerate()
                .map(|(i, name)| SavedTile {
                    name: name.to_string(),
                    position: GridPosition::new(i as i32, 0),
                })
                .collect(),
            explore_cost: 9,
            resources: BTreeMap::from([(ResourceType::Wood, 120), (ResourceType::Crystal, 20)]),
            ..SaveRecord::default()
        }
    }

    #[test]
    fn version_one_restore_reapplies_storage_and_production() {
        let catalog = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let colony = from_save_record(
            &record(&["Headquarters", "Warehouse", "Lumberyard"]),
            &catalog,
            &ColonyConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(colony.grid.len(), 3);
        assert_eq!(colony.ledger.capacity(ResourceType::Wood), 150);
        assert_eq!(colony.ledger.rate(ResourceType::Wood), 2);
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 120);
        assert_eq!(colony.ledger.amount(ResourceType::Crystal), 20);
        assert_eq!(colony.explore_cost(), 9);
    }

    #[test]
    fn unknown_tile_aborts_restore() {
        let catalog = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = from_save_record(
            &record(&["Headquarters", "Greenhouse"]),
            &catalog,
            &ColonyConfig::default(),
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(err, ColonyError::UnknownTile("Greenhouse".into()));
    }

    #[test]
    fn empty_record_generates_new_colony() {
        let catalog = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let colony = from_save_record(
            &SaveRecord::default(),
            &catalog,
            &ColonyConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(colony.grid.len(), 37);
        assert_eq!(colony.explore_cost(), 5);
    }

    #[test]
    fn legacy_positional_amounts_are_accepted() {
        let legacy: SaveRecord = serde_json::from_str(
            r#"{"tiles":[{"name":"Headquarters","position":{"x":0,"y":0}}],
                "explore_cost":7,"resource_amounts":[10,20,0,5]}"#,
        )
        .unwrap();
        assert_eq!(legacy.version, 0);
        let amounts = legacy.amounts();
        assert_eq!(amounts[&ResourceType::Wood], 10);
        assert_eq!(amounts[&ResourceType::Crystal], 20);
        assert_eq!(amounts[&ResourceType::Cargo], 0);
        assert_eq!(amounts[&ResourceType::Population], 5);
    }

    #[test]
    fn short_legacy_amount_list_leaves_the_rest_empty() {
        let legacy: SaveRecord = serde_json::from_str(
            r#"{"tiles":[{"name":"Headquarters","position":{"x":0,"y":0}}],
                "explore_cost":5,"resource_amounts":[10]}"#,
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let colony =
            from_save_record(&legacy, &catalog(), &ColonyConfig::default(), &mut rng).unwrap();
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 10);
        for resource in [ResourceType::Crystal, ResourceType::Cargo, ResourceType::Population] {
            assert_eq!(colony.ledger.amount(resource), 0, "{resource}");
        }
    }

    #[test]
    fn keyed_amounts_missing_a_resource_restore_as_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let colony = from_save_record(
            &record(&["Headquarters"]),
            &catalog(),
            &ColonyConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(colony.ledger.amount(ResourceType::Cargo), 0);
        assert_eq!(colony.ledger.amount(ResourceType::Population), 0);
    }

    #[test]
    fn stored_ledger_wins_over_tile_contributions() {
        let saved = SaveRecord {
            version: SAVE_VERSION,
            capacities: BTreeMap::from([
                (ResourceType::Wood, 150),
                (ResourceType::Crystal, 100),
            ]),
            rates: BTreeMap::from([(ResourceType::Wood, 3)]),
            ..record(&["Headquarters", "Dirt"])
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let colony =
            from_save_record(&saved, &catalog(), &ColonyConfig::default(), &mut rng).unwrap();
        assert_eq!(colony.ledger.capacity(ResourceType::Wood), 150);
        assert_eq!(colony.ledger.rate(ResourceType::Wood), 3);
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 120);
        assert_eq!(colony.ledger.capacity(ResourceType::Cargo), 0);
    }

    #[test]
    fn snapshots_store_capacities_and_rates() {
        let mut colony = ColonyState::empty(&ColonyConfig::default());
        colony.ledger.change_rate(ResourceType::Crystal, 4);
        let json = serde_json::to_value(to_save_record(&colony)).unwrap();
        assert_eq!(json["version"], 2);
        assert_eq!(json["capacities"]["Wood"], 100);
        assert_eq!(json["rates"]["Crystal"], 4);
    }

    #[test]
    fn records_serialize_keyed_amounts() {
        let json = serde_json::to_value(record(&["Dirt"])).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["resources"]["Wood"], 120);
        assert!(json.get("resource_amounts").is_none());
    }

    mod round_trip {
        use super::*;
        use crate::placement::{explore, place_tile, replace};
        use crate::scenario::ScenarioLoader;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Place(i32, i32, usize, bool),
            Replace(i32, i32, usize, bool),
            Explore(i32, i32),
            Tick(f64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (-5i32..=5, -5i32..=5, 0usize..64, any::<bool>())
                    .prop_map(|(x, y, t, c)| Op::Place(x, y, t, c)),
                (-5i32..=5, -5i32..=5, 0usize..64, any::<bool>())
                    .prop_map(|(x, y, t, c)| Op::Replace(x, y, t, c)),
                (-5i32..=5, -5i32..=5).prop_map(|(x, y)| Op::Explore(x, y)),
                (0.0f64..15.0).prop_map(Op::Tick),
            ]
        }

        fn tiles(colony: &ColonyState) -> Vec<(GridPosition, String)> {
            colony
                .grid
                .iter()
                .map(|tile| (tile.position, tile.name().to_string()))
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn saved_colonies_restore_identically(
                seed in any::<u64>(),
                ops in prop::collection::vec(op(), 1..40),
            ) {
                let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
                    .load("scenarios/mars.yaml")
                    .unwrap();
                let catalog = scenario.build_catalog().unwrap();
                let config = scenario.colony_config();
                let definitions: Vec<_> = catalog.iter().cloned().collect();
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let (mut colony, _) = ColonyState::generate(&catalog, &config, &mut rng).unwrap();

                for op in ops {
                    match op {
                        Op::Place(x, y, tile, cargo) => {
                            let definition = definitions[tile % definitions.len()].clone();
                            place_tile(&mut colony, GridPosition::new(x, y), definition, cargo);
                        }
                        Op::Replace(x, y, option, cargo) => {
                            let position = GridPosition::new(x, y);
                            let options = match colony.grid.get(position) {
                                Some(current) => catalog.replacement_options(&current.definition).unwrap(),
                                None => Vec::new(),
                            };
                            if !options.is_empty() {
                                let choice = options[option % options.len()].clone();
                                replace(&mut colony, &catalog, position, choice, cargo).unwrap();
                            }
                        }
                        Op::Explore(x, y) => {
                            let position = GridPosition::new(x, y);
                            if !colony.grid.is_occupied(position) {
                                explore(&mut colony, &catalog, position, &mut rng).unwrap();
                            }
                        }
                        Op::Tick(secs) => {
                            colony.ledger.tick(secs);
                        }
                    }
                }

                let encoded = serde_json::to_string(&to_save_record(&colony)).unwrap();
                let record: SaveRecord = serde_json::from_str(&encoded).unwrap();
                let restored = from_save_record(&record, &catalog, &config, &mut rng).unwrap();

                prop_assert_eq!(tiles(&restored), tiles(&colony));
                prop_assert_eq!(restored.ledger.amounts(), colony.ledger.amounts());
                prop_assert_eq!(restored.ledger.capacities(), colony.ledger.capacities());
                prop_assert_eq!(restored.ledger.rates(), colony.ledger.rates());
                prop_assert_eq!(restored.explore_cost(), colony.explore_cost());
            }
        }
    }
}
