//! git-mcp-server - Git repository tools for AI agents over MCP
//!
//! Run with `git-mcp-server` or `git-mcp-server --help` for usage.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use git_mcp_server::{
    APP_NAME, VERSION,
    config::Config,
    tools::Dispatcher,
    transport::{ServerContext, serve},
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Git repository tools for AI agents, served over MCP")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tools over HTTP + SSE (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the tool catalog as JSON
    Tools,

    /// Run a single tool call and print its output
    Call {
        /// Tool name, e.g. git_status
        tool: String,

        /// Arguments as a JSON object, e.g. '{"repo_path": "."}'
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Show the effective configuration
    Config,
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("info")
            .add_directive("gix=warn".parse()?)
            .add_directive("tokio=warn".parse()?)
            .add_directive("hyper=warn".parse()?)
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("opening log file {}", path.display()))?;

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(file).with_ansi(false).with_target(false))
                .with(filter)
                .init();
        }
        None => {
            // stdout carries tool output for `call` and `tools`
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .with(filter)
                .init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    setup_logging(cli.debug || config.debug, config.log_file.as_deref())?;

    let dispatcher = Arc::new(Dispatcher::new(&config));

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .wrap_err_with(|| format!("invalid listen address {}:{}", host, port))?;

            info!("Starting {} v{}", APP_NAME, VERSION);
            let context = Arc::new(ServerContext::new(dispatcher, config.roots_timeout()));
            serve(context, addr).await.map_err(|e| eyre!(e))?;
        }

        Commands::Tools => {
            let tools = serde_json::to_string_pretty(dispatcher.list_tools())?;
            println!("{}", tools);
        }

        Commands::Call { tool, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).wrap_err("arguments must be valid JSON")?;
            let content = dispatcher.call(&tool, args).await?;
            for block in content {
                println!("{}", block.as_text());
            }
        }

        Commands::Config => {
            println!("Configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
            println!("\nConfig file: {:?}", Config::config_file_path()?);
        }
    }

    Ok(())
}
