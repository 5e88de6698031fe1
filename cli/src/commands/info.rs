//! Show configuration and endpoint health

use anyhow::Result;
use colored::Colorize;
use nudge_engine::config::config_file;
use nudge_engine::{EngineConfig, LedgerConnections};
use solana_sdk::{native_token::lamports_to_sol, signer::Signer};

use crate::config::{default_keypair_path, load_solana_keypair, stealth_identity};
use crate::payments::JsonlPaymentRecorder;

fn health_label(healthy: bool) -> colored::ColoredString {
    if healthy {
        "OK".green()
    } else {
        "UNREACHABLE".red()
    }
}

pub async fn run(config: EngineConfig, keypair_path: Option<&str>) -> Result<()> {
    println!();
    println!("{}", "Nudge Configuration".yellow().bold());
    println!();

    println!("{}:", "RPC Endpoint".cyan());
    match config.rpc_url() {
        Ok(url) => println!("  {}", url),
        Err(_) => {
            println!("  {}", "NOT CONFIGURED".red());
            println!("  Set NUDGE_RPC_URL or pass --rpc-url");
        }
    }
    println!();

    println!("{}:", "Proxy".cyan());
    match config.proxy_url() {
        Ok(url) => println!("  {}", url),
        Err(_) => println!("  {}", "not set (direct reads only)".dimmed()),
    }
    println!();

    println!("{}:", "Cluster".cyan());
    println!("  {:?}", config.cluster);
    println!(
        "  Minimum deposit: {} SOL",
        lamports_to_sol(config.min_deposit_lamports)
    );
    println!();

    println!("{}:", "Solana Wallet".cyan());
    match load_solana_keypair(keypair_path) {
        Ok(wallet) => {
            println!("  Address: {}", wallet.pubkey());
            let stealth = stealth_identity(&wallet)?;
            println!("  Stealth: {}", stealth.public_key());
        }
        Err(_) => {
            println!("  {}", "NOT CONFIGURED".red());
            println!("  Run 'solana-keygen new' to create a wallet");
        }
    }
    println!();

    let connections = LedgerConnections::new(config);
    let (rpc_ok, indexer_ok) = tokio::join!(
        connections.check_rpc_health(),
        connections.check_indexer_health()
    );
    println!("{}:", "Health".cyan());
    println!("  RPC:     {}", health_label(rpc_ok));
    println!("  Indexer: {}", health_label(indexer_ok));
    println!();

    println!("{}:", "File Locations".cyan());
    if let Some(path) = config_file() {
        println!("  Config:   {}", path.display());
    }
    if let Some(path) = JsonlPaymentRecorder::default_path() {
        println!("  Payments: {}", path.display());
    }
    if let Ok(path) = default_keypair_path() {
        println!("  Wallet:   {}", path.display());
    }

    Ok(())
}
