use thiserror::Error;

use crate::grid::GridPosition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColonyError {
    #[error("unknown tile '{0}'")]
    UnknownTile(String),
    #[error("tile '{0}' defined more than once")]
    DuplicateTile(String),
    #[error("no tile at {0}")]
    NotOccupied(GridPosition),
    #[error("'{current}' cannot be replaced by '{requested}'")]
    NotReplaceable { current: String, requested: String },
    #[error("catalog has no terrain or resource tiles to explore with")]
    NoExploreTiles,
}
