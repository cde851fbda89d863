//! Tile placement, replacement and exploration transactions.
//!
//! Costs are settled through `ResourceLedger::adjust`, which clamps instead of
//! failing. Callers gate commands with [`can_afford`] and [`can_explore`].

use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::catalog::{ResourceType, TileCatalog, TileDefinition, TileKind};
use crate::colony::ColonyState;
use crate::error::ColonyError;
use crate::grid::{GridPosition, PlacedTile};
use crate::ledger::ResourceLedger;
use crate::mapgen::choose_wild_tile;

/// Costs settled by one payment channel: cargo-only or everything but cargo.
fn applicable_costs(
    definition: &TileDefinition,
    use_cargo: bool,
) -> impl Iterator<Item = (ResourceType, i64)> + '_ {
    definition
        .costs
        .iter()
        .filter(move |cost| (cost.resource == ResourceType::Cargo) == use_cargo)
        .map(|cost| (cost.resource, cost.amount))
}

/// Swaps the storage/production contribution of the previous occupant for the
/// new definition's.
fn apply_contribution(
    ledger: &mut ResourceLedger,
    definition: &TileDefinition,
    previous: Option<&PlacedTile>,
) {
    let previous = previous.map(|tile| tile.definition.as_ref());
    match definition.kind {
        TileKind::Storage => {
            let before = previous.map(TileDefinition::storage_capacity).unwrap_or(0);
            ledger.change_capacity(definition.resource, definition.storage_capacity() - before);
        }
        TileKind::Production => {
            let before = previous.map(TileDefinition::production_rate).unwrap_or(0);
            ledger.change_rate(definition.resource, definition.production_rate() - before);
        }
        _ => {}
    }
}

/// Places `definition` at `position`, adjusting capacity/rate and paying its
/// costs through the chosen channel. Returns the previous occupant.
pub fn place_tile(
    colony: &mut ColonyState,
    position: GridPosition,
    definition: Arc<TileDefinition>,
    use_cargo: bool,
) -> Option<PlacedTile> {
    let previous = colony.grid.place(position, Arc::clone(&definition));
    apply_contribution(&mut colony.ledger, &definition, previous.as_ref());
    for (resource, amount) in applicable_costs(&definition, use_cargo) {
        colony.ledger.adjust(resource, -amount, true);
    }
    previous
}

/// Places a tile restored from a save: contribution applied, nothing paid.
pub(crate) fn restore_tile(
    colony: &mut ColonyState,
    position: GridPosition,
    definition: Arc<TileDefinition>,
) {
    let previous = colony.grid.place(position, Arc::clone(&definition));
    apply_contribution(&mut colony.ledger, &definition, previous.as_ref());
}

/// Reveals `position` as a random terrain or resource tile and charges the
/// current explore cost in crystal.
pub fn explore<R: Rng + ?Sized>(
    colony: &mut ColonyState,
    catalog: &TileCatalog,
    position: GridPosition,
    rng: &mut R,
) -> Result<Arc<TileDefinition>, ColonyError> {
    let definition = choose_wild_tile(catalog, rng).ok_or(ColonyError::NoExploreTiles)?;
    let cost = colony.explore_cost();
    place_tile(colony, position, Arc::clone(&definition), false);
    colony.ledger.adjust(ResourceType::Crystal, -cost, true);
    colony.bump_explore_cost();
    info!(
        %position,
        tile = %definition.name,
        cost,
        next_cost = colony.explore_cost(),
        "explored tile"
    );
    Ok(definition)
}

/// Replaces the tile at an occupied position with one of its replacement options.
pub fn replace(
    colony: &mut ColonyState,
    catalog: &TileCatalog,
    position: GridPosition,
    definition: Arc<TileDefinition>,
    use_cargo: bool,
) -> Result<PlacedTile, ColonyError> {
    let current = colony
        .grid
        .get(position)
        .ok_or(ColonyError::NotOccupied(position))?;
    let allowed = catalog
        .replacement_options(&current.definition)?
        .iter()
        .any(|option| option.name == definition.name);
    if !allowed {
        return Err(ColonyError::NotReplaceable {
            current: current.name().to_string(),
            requested: definition.name.clone(),
        });
    }
    let name = definition.name.clone();
    let previous =
        place_tile(colony, position, definition, use_cargo).ok_or(ColonyError::NotOccupied(position))?;
    info!(%position, from = %previous.name(), to = %name, use_cargo, "replaced tile");
    Ok(previous)
}

/// Whether the ledger covers every cost paid through the chosen channel.
pub fn can_afford(ledger: &ResourceLedger, definition: &TileDefinition, use_cargo: bool) -> bool {
    applicable_costs(definition, use_cargo).all(|(resource, amount)| ledger.amount(resource) >= amount)
}

pub fn can_explore(colony: &ColonyState) -> bool {
    colony.ledger.amount(ResourceType::Crystal) >= colony.explore_cost()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TileTag;
    use crate::colony::ColonyConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog() -> TileCatalog {
        TileCatalog::new(vec![
            TileDefinition::new("Dirt", TileKind::Terrain).with_replacements(["Warehouse", "Lumberyard"]),
            TileDefinition::new("Trees", TileKind::Terrain).with_tag(TileTag::Trees),
            TileDefinition::new("Crystals", TileKind::Resource).with_tag(TileTag::Crystals),
            TileDefinition::storage("Warehouse", ResourceType::Wood, 50)
                .with_cost(ResourceType::Wood, 30)
                .with_cost(ResourceType::Crystal, 10)
                .with_cost(ResourceType::Cargo, 25)
                .with_replacements(["Shed"]),
            TileDefinition::storage("Shed", ResourceType::Wood, 20),
            TileDefinition::production("Lumberyard", ResourceType::Wood, 3)
                .with_cost(ResourceType::Wood, 5),
        ])
        .unwrap()
    }

    fn colony() -> ColonyState {
        ColonyState::empty(&ColonyConfig::default())
    }

    #[test]
    fn storage_placement_raises_capacity_and_pays_raw_costs() {
        let catalog = catalog();
        let mut colony = colony();
        let pos = GridPosition::new(1, 0);
        place_tile(&mut colony, pos, catalog.lookup("Warehouse").unwrap(), false);
        assert_eq!(colony.ledger.capacity(ResourceType::Wood), 150);
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 70);
        assert_eq!(colony.ledger.amount(ResourceType::Crystal), 90);
        assert_eq!(colony.ledger.amount(ResourceType::Cargo), 100);
    }

    #[test]
    fn cargo_channel_pays_only_cargo() {
        let catalog = catalog();
        let mut colony = colony();
        place_tile(
            &mut colony,
            GridPosition::new(1, 0),
            catalog.lookup("Warehouse").unwrap(),
            true,
        );
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 100);
        assert_eq!(colony.ledger.amount(ResourceType::Crystal), 100);
        assert_eq!(colony.ledger.amount(ResourceType::Cargo), 75);
    }

    #[test]
    fn replacing_storage_applies_net_capacity() {
        let catalog = catalog();
        let mut colony = colony();
        let pos = GridPosition::new(0, 1);
        place_tile(&mut colony, pos, catalog.lookup("Warehouse").unwrap(), true);
        let before = colony.ledger.capacity(ResourceType::Wood);
        let previous = replace(&mut colony, &catalog, pos, catalog.lookup("Shed").unwrap(), false).unwrap();
        assert_eq!(previous.name(), "Warehouse");
        assert_eq!(colony.ledger.capacity(ResourceType::Wood) - before, -30);
    }

    #[test]
    fn production_placement_raises_rate() {
        let catalog = catalog();
        let mut colony = colony();
        let pos = GridPosition::new(2, 0);
        colony.grid.place(pos, catalog.lookup("Dirt").unwrap());
        replace(&mut colony, &catalog, pos, catalog.lookup("Lumberyard").unwrap(), false).unwrap();
        assert_eq!(colony.ledger.rate(ResourceType::Wood), 3);
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 95);
    }

    #[test]
    fn replace_requires_an_occupied_cell() {
        let catalog = catalog();
        let mut colony = colony();
        let pos = GridPosition::new(4, 4);
        let err = replace(&mut colony, &catalog, pos, catalog.lookup("Shed").unwrap(), false).unwrap_err();
        assert_eq!(err, ColonyError::NotOccupied(pos));
    }

    #[test]
    fn replace_rejects_unlisted_options() {
        let catalog = catalog();
        let mut colony = colony();
        let pos = GridPosition::new(1, 1);
        colony.grid.place(pos, catalog.lookup("Dirt").unwrap());
        let err = replace(&mut colony, &catalog, pos, catalog.lookup("Shed").unwrap(), false).unwrap_err();
        assert!(matches!(err, ColonyError::NotReplaceable { .. }));
        assert_eq!(colony.grid.get(pos).unwrap().name(), "Dirt");
    }

    #[test]
    fn unaffordable_costs_clamp_to_zero() {
        let catalog = catalog();
        let mut colony = colony();
        colony.ledger.adjust(ResourceType::Wood, -90, false);
        let warehouse = catalog.lookup("Warehouse").unwrap();
        assert!(!can_afford(&colony.ledger, &warehouse, false));
        assert!(can_afford(&colony.ledger, &warehouse, true));
        place_tile(&mut colony, GridPosition::new(3, 0), warehouse, false);
        assert_eq!(colony.ledger.amount(ResourceType::Wood), 0);
    }

    #[test]
    fn explore_charges_crystal_and_raises_cost() {
        let catalog = catalog();
        let mut colony = colony();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let target = GridPosition::new(-4, 0);
        assert!(can_explore(&colony));
        let chosen = explore(&mut colony, &catalog, target, &mut rng).unwrap();
        assert!(matches!(chosen.kind, TileKind::Terrain | TileKind::Resource));
        assert_eq!(colony.ledger.amount(ResourceType::Crystal), 95);
        assert_eq!(colony.explore_cost(), 6);
        assert_eq!(colony.grid.get(target).unwrap().name(), chosen.name);
    }

    #[test]
    fn explore_without_wild_tiles_fails() {
        let catalog = TileCatalog::new(vec![TileDefinition::storage("Shed", ResourceType::Wood, 20)]).unwrap();
        let mut colony = colony();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let err = explore(&mut colony, &catalog, GridPosition::ORIGIN, &mut rng).unwrap_err();
        assert_eq!(err, ColonyError::NoExploreTiles);
        assert_eq!(colony.explore_cost(), 5);
    }
}
