//! CLI helper functions

use crate::{
    config::TapConfig,
    singer::{Catalog, SingerWriter, SyncState},
    sync::{SyncSummary, Tap},
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use std::io::Write;
use std::path::Path;

/// `--config` value that reads settings from the environment
pub const CONFIG_FROM_ENV: &str = "ENV";

/// Load the tap settings
///
/// `ENV` reads `TAP_GORGIAS_*` environment variables, anything else is the
/// path of a JSON config file.
pub fn load_config(arg: &str) -> Result<TapConfig> {
    if arg == CONFIG_FROM_ENV {
        log::debug!("Reading settings from the environment");
        return TapConfig::from_env().context("Failed to read settings from the environment");
    }
    TapConfig::read(arg).with_context(|| format!("Failed to load config file {}", arg))
}

/// Load the state given with `--state`, or start from scratch.
pub fn load_state(path: Option<&Path>) -> Result<SyncState> {
    let Some(path) = path else {
        log::info!("No state given, starting from the configured start date");
        return Ok(SyncState::new());
    };
    let state = SyncState::read(path)
        .with_context(|| format!("Failed to load state file {}", path.display()))?;
    log::info!(
        "Loaded {} bookmark(s) from {}",
        state.bookmarks.len(),
        path.display().bright_black()
    );
    Ok(state)
}

/// Load the catalog given with `--catalog`; `None` selects every stream.
pub fn load_catalog(path: Option<&Path>) -> Result<Option<Catalog>> {
    path.map(|path| {
        Catalog::read(path).with_context(|| format!("Failed to load catalog {}", path.display()))
    })
    .transpose()
}

/// Write the catalog of every stream
pub fn discover(mut out: impl Write) -> Result<()> {
    let catalog = Catalog::discover();
    serde_json::to_writer_pretty(&mut out, &catalog).context("Failed to write catalog")?;
    writeln!(out)?;
    log::info!("Discovered {} stream(s)", catalog.streams.len());
    Ok(())
}

/// Write the connector metadata and settings schema
pub fn about(mut out: impl Write) -> Result<()> {
    let about = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "capabilities": ["catalog", "state", "discover", "about"],
        "settings": TapConfig::settings_schema(),
    });
    serde_json::to_writer_pretty(&mut out, &about).context("Failed to write about")?;
    writeln!(out)?;
    Ok(())
}

/// Check the credentials against `/api/users/0`
pub async fn test_connection(config: TapConfig) -> Result<i64> {
    let tap = Tap::new(config).context("Failed to create Gorgias client")?;
    log::info!("Testing connection to {}", tap.client().url().bright_black());
    let user_id = tap
        .test_connection()
        .await
        .context("Connection test failed")?;
    log::info!("✓ Authenticated as user {}", user_id.cyan());
    Ok(user_id)
}

/// Run a sync and write Singer messages to `out`
pub async fn sync(
    config: TapConfig,
    state: Option<&Path>,
    catalog: Option<&Path>,
    out: impl Write,
) -> Result<SyncSummary> {
    let state = load_state(state)?;
    let catalog = load_catalog(catalog)?;
    let tap = Tap::new(config).context("Failed to create Gorgias client")?;
    log::info!("Syncing from {}", tap.client().url().bright_black());

    let mut writer = SingerWriter::new(out);
    let summary = tap
        .sync(catalog.as_ref(), state, &mut writer)
        .await
        .context("Sync failed")?;
    writer.flush().context("Failed to flush output")?;

    for (stream, count) in &summary.records {
        log::info!("✓ {}: {} record(s)", stream, count.cyan());
    }
    log::info!("✓ Wrote {} record(s)", writer.records_written());
    Ok(summary)
}
