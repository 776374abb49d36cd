mod batch;
mod config;
mod console;
mod error;
mod vmanage;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use batch::{BatchOptions, CatalogMode};
use config::PartialConfig;
use console::{AssumeYes, Console, StdConsole};
use vmanage::{PollOptions, VmanageClient};

/// Attach vManage device templates from a CSV roster.
#[derive(Parser)]
#[command(name = "vmanage-attach", version, about = "Attach vManage device templates from a CSV roster")]
struct Cli {
    /// Roster CSV with device_ip,template_name columns
    #[arg(long, default_value = "device_templates.csv")]
    input: PathBuf,

    /// Persisted controller settings (JSON)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Seconds between action status polls
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Give up monitoring an action after this many polls
    #[arg(long, default_value_t = 120)]
    max_polls: u32,

    /// Re-fetch device and template collections for every row instead of
    /// caching them for the batch
    #[arg(long)]
    refresh_per_row: bool,

    /// Answer yes to every confirmation prompt
    #[arg(long)]
    assume_yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmanage_attach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut console: Box<dyn Console> = if cli.assume_yes {
        Box::new(AssumeYes(StdConsole))
    } else {
        Box::new(StdConsole)
    };

    let controller = PartialConfig::from_file(&cli.config)?
        .apply_env()?
        .resolve(console.as_mut())?;

    tracing::info!("Connecting to vManage at {}:{}", controller.host, controller.port);
    let client = VmanageClient::login(&controller).await?;
    tracing::info!("Authenticated as {}", controller.username);

    let rows = batch::read_rows(&cli.input)?;
    tracing::info!("Loaded {} roster rows from {}", rows.len(), cli.input.display());

    let options = BatchOptions {
        catalog_mode: if cli.refresh_per_row {
            CatalogMode::PerRow
        } else {
            CatalogMode::PerBatch
        },
        poll: PollOptions {
            interval: Duration::from_secs(cli.poll_interval),
            max_attempts: cli.max_polls,
        },
    };

    let summary = batch::run(&client, &rows, &options, console.as_mut()).await?;

    println!(
        "Batch complete: {} attached, {} cancelled, {} failed",
        summary.attached,
        summary.cancelled,
        summary.errors.len()
    );
    for error in &summary.errors {
        println!("  failed: {}", error);
    }

    Ok(())
}
