mod autosave;
mod production;

pub use autosave::AutosaveSystem;
pub use production::ProductionSystem;
