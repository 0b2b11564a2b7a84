use std::io::IsTerminal;
use std::sync::Arc;

use common::{Error, Tier};
use tracing::info;

use crate::config::Config;
use crate::export::{EnvFileExporter, Exporter, Exporters, PrintExporter};
use crate::tui::{run_dashboard, Dashboard};

use super::{probe_context, require_credentials};

pub async fn dashboard(cfg: Config, tier: Option<Tier>) -> anyhow::Result<()> {
    let credentials = Arc::new(cfg.credentials());
    require_credentials(&cfg, &credentials)?;
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Err(Error::NotATerminal.into());
    }

    let print = Arc::new(PrintExporter::default());
    let mut targets: Vec<Arc<dyn Exporter>> = vec![print.clone()];
    if let Some(env) = EnvFileExporter::in_data_dir() {
        targets.push(Arc::new(env));
    }

    let dash = Dashboard {
        ctx: probe_context(&cfg, credentials.clone()),
        credentials,
        exporters: Exporters::new(targets),
        settings: cfg.settings(),
        tier,
    };
    run_dashboard(dash).await?;

    if let Some(selection) = print.take() {
        info!(entity=%selection.key, "printing selection");
        println!("{}", selection.key);
    }
    Ok(())
}
