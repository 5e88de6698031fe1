//! Nudge CLI - private SOL payments through stealth addresses

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use nudge_engine::EngineError;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod payments;


use commands::*;

#[derive(Parser)]
#[command(name = "nudge")]
#[command(version = "0.1.0")]
#[command(about = "Shielded SOL payments to stealth addresses on Solana")]
#[command(long_about = r#"
Nudge lets you receive SOL without exposing your main wallet.

Your stealth address is derived from a signature of your wallet, so it is
never stored anywhere. Senders pay it through Light Protocol compression;
you later move the whole shielded balance back to your wallet.

Quick Start:
  1. nudge derive                Show your stealth address
  2. nudge address               Get a shareable payment link
  3. nudge balance               Check what has arrived
  4. nudge withdraw              Unshield everything to your wallet
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Solana RPC URL with the compression API (overrides NUDGE_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Proxy base URL for delegated reads (overrides NUDGE_PROXY_URL)
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// Cluster preset for state trees: devnet, mainnet or localnet
    #[arg(long, global = true)]
    cluster: Option<String>,

    /// Path to keypair file
    #[arg(long, global = true)]
    keypair: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive and show your stealth address
    Derive,

    /// Show the payment link for your stealth address
    Address {
        /// Public URL the `serve` command is reachable at
        #[arg(long, default_value = "http://localhost:3000")]
        host: String,
    },

    /// Show shielded balance
    Balance {
        /// Stealth addresses to sum (default: your own)
        #[arg(long = "stealth")]
        stealth: Vec<String>,

        /// Read through the proxy instead of the indexer
        #[arg(long)]
        proxy: bool,
    },

    /// Send SOL into a stealth address
    Deposit {
        /// Recipient stealth address
        #[arg(short, long)]
        to: String,

        /// Amount of SOL to send
        #[arg(short, long)]
        amount: f64,
    },

    /// Unshield the whole stealth balance
    Withdraw {
        /// Destination address (default: your main wallet)
        #[arg(short, long)]
        to: Option<String>,

        /// Read through the proxy instead of the indexer
        #[arg(long)]
        proxy: bool,
    },

    /// Serve the proxy endpoints and the payment action
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: String,

        /// Public URL used in action metadata (default: http://<bind>)
        #[arg(long)]
        host_url: Option<String>,
    },

    /// Show configuration and endpoint health
    Info,
}

async fn run(cli: Cli) -> Result<()> {
    let engine_config = config::engine_config(
        cli.rpc_url.as_deref(),
        cli.proxy_url.as_deref(),
        cli.cluster.as_deref(),
    )?;
    let keypair = cli.keypair.as_deref();

    match cli.command {
        Commands::Derive => {
            derive::run(keypair)?;
        }
        Commands::Address { host } => {
            address::run(keypair, &host)?;
        }
        Commands::Balance { stealth, proxy } => {
            balance::run(engine_config, keypair, &stealth, proxy).await?;
        }
        Commands::Deposit { to, amount } => {
            deposit::run(engine_config, keypair, &to, amount).await?;
        }
        Commands::Withdraw { to, proxy } => {
            withdraw::run(engine_config, keypair, to.as_deref(), proxy).await?;
        }
        Commands::Serve { bind, host_url } => {
            serve::run(engine_config, &bind, host_url.as_deref()).await?;
        }
        Commands::Info => {
            info::run(engine_config, keypair).await?;
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        if let Some(engine) = err.downcast_ref::<EngineError>() {
            eprintln!("  {}", engine.user_message().dimmed());
            if engine.is_retryable() {
                eprintln!("  {}", "This may succeed if you try again.".dimmed());
            }
        }
        std::process::exit(1);
    }
}
