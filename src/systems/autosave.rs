use anyhow::Result;
use tracing::info;

use crate::{
    colony::ColonyState,
    engine::{System, SystemContext},
    rng::SystemRng,
};

/// Flags a save checkpoint each time the autosave interval elapses.
pub struct AutosaveSystem;

impl AutosaveSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AutosaveSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AutosaveSystem {
    fn name(&self) -> &str {
        "autosave"
    }

    fn run(
        &mut self,
        ctx: &mut SystemContext<'_>,
        colony: &mut ColonyState,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if colony.advance_save_timer(ctx.elapsed_secs, ctx.autosave_interval_secs) {
            ctx.autosave_due = true;
            info!(colony = ctx.colony_name, tick = ctx.tick, "autosave due");
        }
        Ok(())
    }
}
