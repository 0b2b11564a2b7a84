use std::sync::Arc;

use common::Tier;
use tracing::info;

use crate::config::Config;
use crate::probe::{lock, probe_best, BestOptions, Probe};

use super::{probe_context, require_credentials};

/// Non-interactive selection: prints the winning `provider/model`.
pub async fn best(mut cfg: Config, passes: usize, tier: Option<Tier>) -> anyhow::Result<()> {
    if let Some(tier) = tier {
        cfg.models.retain(|m| m.tier == tier);
    }
    let credentials = Arc::new(cfg.credentials());
    require_credentials(&cfg, &credentials)?;

    let ctx = probe_context(&cfg, credentials);
    let opts = BestOptions {
        passes,
        ..BestOptions::default()
    };
    let picked = probe_best(&ctx, &opts).await;
    ctx.prober.shutdown().await;
    let key = picked?;
    if let Some(entity) = lock(&ctx.session).entity(&key) {
        let stats = entity.stats();
        info!(entity=%key, avg_ms = stats.average_ms(), uptime = stats.uptime_percent(), "selected");
    }
    println!("{key}");
    Ok(())
}
