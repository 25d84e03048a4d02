use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outreach::config::AppConfig;

#[derive(Parser)]
#[command(name = "outreach", about = "Run the LinkedIn sales outreach agent")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// LinkedIn search query to find target profiles
    #[arg(short, long)]
    query: Option<String>,

    /// Run the browser in headless mode (default: UI visible)
    #[arg(long)]
    headless: bool,

    /// Checkpoint session token to resume; derived from account and query by default
    #[arg(long)]
    session: Option<String>,

    /// Do not read or write checkpoints
    #[arg(long)]
    no_checkpoint: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with((!cli.log_json).then(|| tracing_subscriber::fmt::layer()))
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(query) = cli.query {
        config.outreach.query = query;
    }
    if cli.headless {
        config.browser.headless = true;
    }
    if cli.session.is_some() {
        config.outreach.session = cli.session;
    }
    if cli.no_checkpoint {
        config.checkpoint.enabled = false;
    }

    let summary = outreach::runner::run(&config).await?;

    println!(
        "Outreach completed for {} profiles!",
        summary.targets_processed
    );

    Ok(())
}
