use std::fs::OpenOptions;

use anyhow::{Context, Result};
use env_logger::{Builder, Target};

use crate::config_mod::xdg_state_dir;

const LOG_ENV: &str = "RATGMAIL_LOG";

/// The terminal belongs to the UI, so log output goes to a file and is only
/// enabled when a filter is set in the environment.
pub(crate) fn init_logging() -> Result<()> {
    let filters = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .filter(|f| !f.trim().is_empty());
    let Some(filters) = filters else {
        return Ok(());
    };

    let dir = xdg_state_dir().join("ratgmail");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("ratgmail.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    Builder::new()
        .parse_filters(&filters)
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("Logger already initialized")?;
    log::info!("ratgmail {} logging to {}", env!("CARGO_PKG_VERSION"), path.display());
    Ok(())
}
