use clap::Parser;

use fanfou_core::EnvSource;
use fanfou_mcp_runtime::{EndpointArgs, McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "fanfou-mcp",
    version,
    about = "FanFou MCP server over stdio (credentials from FANFOU_* environment variables)"
)]
struct Cli {
    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Option<McpCommands>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanfou_mcp_runtime=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(McpCommands::Serve);
    let code = run_mcp(cli.endpoints.endpoints(), &EnvSource, command).await;
    std::process::exit(code);
}
