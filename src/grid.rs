//! Sparse tile grid keyed by integer coordinates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::TileDefinition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_origin(self) -> bool {
        self == Self::ORIGIN
    }

    /// The six neighbours in the offset layout produced by the ring generator,
    /// where odd rows sit half a cell to the right of even rows.
    pub fn neighbors(self) -> [GridPosition; 6] {
        let Self { x, y } = self;
        let shift = if y.rem_euclid(2) == 1 { 1 } else { 0 };
        [
            Self::new(x - 1, y),
            Self::new(x + 1, y),
            Self::new(x - 1 + shift, y - 1),
            Self::new(x + shift, y - 1),
            Self::new(x - 1 + shift, y + 1),
            Self::new(x + shift, y + 1),
        ]
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone)]
pub struct PlacedTile {
    pub position: GridPosition,
    pub definition: Arc<TileDefinition>,
}

impl PlacedTile {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

#[derive(Debug, Clone, Default)]
pub struct Grid {
    tiles: BTreeMap<GridPosition, PlacedTile>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: GridPosition) -> Option<&PlacedTile> {
        self.tiles.get(&position)
    }

    pub fn is_occupied(&self, position: GridPosition) -> bool {
        self.tiles.contains_key(&position)
    }

    /// Inserts or overwrites the tile at `position`, returning whatever was there.
    pub fn place(
        &mut self,
        position: GridPosition,
        definition: Arc<TileDefinition>,
    ) -> Option<PlacedTile> {
        self.tiles.insert(
            position,
            PlacedTile {
                position,
                definition,
            },
        )
    }

    pub fn remove(&mut self, position: GridPosition) -> Option<PlacedTile> {
        self.tiles.remove(&position)
    }

    pub fn occupied_positions(&self) -> BTreeSet<GridPosition> {
        self.tiles.keys().copied().collect()
    }

    /// Tiles in ascending `(x, y)` order.
    pub fn iter(&self) -> impl Iterator<Item = &PlacedTile> {
        self.tiles.values()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Empty cells bordering at least one occupied cell.
    pub fn frontier(&self) -> BTreeSet<GridPosition> {
        self.tiles
            .keys()
            .flat_map(|position| position.neighbors())
            .filter(|candidate| !self.tiles.contains_key(candidate))
            .collect()
    }
}
