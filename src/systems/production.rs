use anyhow::Result;
use tracing::info;

use crate::{
    colony::ColonyState,
    engine::{System, SystemContext},
    rng::SystemRng,
};

/// Credits each resource's production rate once per production interval.
pub struct ProductionSystem;

impl ProductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn run(
        &mut self,
        ctx: &mut SystemContext<'_>,
        colony: &mut ColonyState,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if colony.ledger.tick(ctx.elapsed_secs) {
            ctx.produced = true;
            info!(
                colony = ctx.colony_name,
                tick = ctx.tick,
                rates = ?colony.ledger.rates(),
                "production applied"
            );
        }
        Ok(())
    }
}
