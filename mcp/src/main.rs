use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commonroom_core::Config;
use commonroom_core::config::DEFAULT_API_URL;
use commonroom_mcp_runtime::{EXIT_CONFIG_ERROR, McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "commonroom-mcp",
    version,
    about = "Common Room MCP server: community API tools over stdio"
)]
struct Cli {
    /// Common Room API token
    #[arg(long, env = "COMMONROOM_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Dashboard base URL, e.g. https://app.commonroom.io/community/1234-acme
    #[arg(long, env = "COMMONROOM_BASE_URL")]
    base_url: Option<String>,

    /// Common Room REST API base URL
    #[arg(long, env = "COMMONROOM_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Structured JSON logging on stderr; stdout carries the protocol.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commonroom_mcp=info,commonroom_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::new(cli.api_key, &cli.api_url, cli.base_url) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            eprintln!("{err}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let code = run_mcp(config, cli.command).await;
    std::process::exit(code);
}
