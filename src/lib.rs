pub mod catalog;
pub mod colony;
pub mod engine;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod mapgen;
pub mod placement;
pub mod rng;
pub mod save;
pub mod scenario;
pub mod systems;
pub mod transport;
pub mod web;

pub use catalog::{ResourceType, TileCatalog, TileDefinition, TileKind, TileTag};
pub use colony::{ColonyConfig, ColonyState};
pub use engine::{ColonyControls, Engine, EngineBuilder, LaunchContext, TickReport};
pub use error::ColonyError;
pub use grid::{Grid, GridPosition, PlacedTile};
pub use save::SaveRecord;
