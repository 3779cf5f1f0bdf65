use clap::Parser;
use std::path::PathBuf;

use ascent_core::config::Config;

#[derive(Parser)]
#[command(
    name = "ascent-server",
    about = "Leadership-development program backend — trait scoring, sprints, and nudges",
    version
)]
struct Cli {
    /// Path to the YAML config file (defaults apply when missing)
    #[arg(long, env = "ASCENT_CONFIG", default_value = "ascent.yaml")]
    config: PathBuf,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    ascent_server::serve(config).await
}
