use clap::{Parser, builder::styling};
use eyre::{Result, bail};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tap_gorgias::cli;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// tap-gorgias: a Singer tap for Gorgias tickets, ticket messages and satisfaction surveys
#[derive(Parser)]
#[command(name = "tap-gorgias", version, styles = STYLES)]
struct Cli {
    /// JSON config file, or ENV to read TAP_GORGIAS_* variables
    #[arg(short, long)]
    config: Option<String>,

    /// State file with the bookmarks of a previous run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Catalog file selecting the streams to sync
    #[arg(long, alias = "properties")]
    catalog: Option<PathBuf>,

    /// Print the catalog and exit
    #[arg(short, long, conflicts_with_all = ["about", "test"])]
    discover: bool,

    /// Print connector metadata and the settings schema and exit
    #[arg(long, conflicts_with = "test")]
    about: bool,

    /// Check the credentials and exit
    #[arg(long)]
    test: bool,

    /// The dotenv file to source settings from, when it exists
    #[arg(short, long, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if Path::new(&cli.env).exists() {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    // env_logger writes to stderr, stdout only carries Singer messages
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if cli.about {
        return cli::about(std::io::stdout().lock());
    }
    if cli.discover {
        return cli::discover(std::io::stdout().lock());
    }

    let Some(config) = cli.config.as_deref() else {
        bail!("--config is required to test or sync");
    };
    log::info!("Loading settings from {}", config.bright_black());
    let config = cli::load_config(config)?;

    if cli.test {
        cli::test_connection(config).await?;
        return Ok(());
    }

    cli::sync(
        config,
        cli.state.as_deref(),
        cli.catalog.as_deref(),
        std::io::stdout().lock(),
    )
    .await?;

    Ok(())
}
