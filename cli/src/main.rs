use clap::{Parser, Subcommand};
use fanfou_mcp_runtime::{EndpointArgs, McpCommands};

mod commands;
mod util;

use commands::auth::AuthCommands;
use commands::tools::ToolsCommands;

#[derive(Parser)]
#[command(name = "fanfou", version, about = "FanFou microblog tools from the command line")]
struct Cli {
    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Token management (x_auth login, logout)
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// List and call FanFou tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },
    /// Model Context Protocol server
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries JSON output and MCP frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanfou_cli=info,fanfou_mcp_runtime=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let endpoints = cli.endpoints.endpoints();

    let code = match cli.command {
        Commands::Auth { command } => match commands::auth::run(endpoints, command).await {
            Ok(()) => 0,
            Err(e) => util::exit_error(&e.to_string(), None),
        },
        Commands::Tools { command } => {
            commands::tools::run(endpoints, &util::CliSource::load(), command).await
        }
        Commands::Mcp { command } => {
            fanfou_mcp_runtime::run(endpoints, &util::CliSource::load(), command).await
        }
    };
    std::process::exit(code);
}
