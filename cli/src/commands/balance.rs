//! Show shielded balance across stealth addresses

use anyhow::{Context, Result};
use colored::Colorize;
use nudge_engine::stealth::truncate_address;
use nudge_engine::{BalanceAggregator, DataPath, EngineConfig, LedgerConnections};
use solana_sdk::pubkey::Pubkey;

use crate::config::{load_solana_keypair, stealth_identity};

pub async fn run(
    config: EngineConfig,
    keypair_path: Option<&str>,
    stealth_keys: &[String],
    proxy: bool,
) -> Result<()> {
    println!("{}", "Calculating shielded balance...".cyan());

    let owners: Vec<Pubkey> = if stealth_keys.is_empty() {
        let wallet = load_solana_keypair(keypair_path)?;
        vec![stealth_identity(&wallet)?.public_key()]
    } else {
        stealth_keys
            .iter()
            .map(|key| {
                key.parse::<Pubkey>()
                    .with_context(|| format!("Invalid stealth address: {key}"))
            })
            .collect::<Result<_>>()?
    };

    let path = if proxy { DataPath::Proxy } else { DataPath::Direct };
    let connections = LedgerConnections::new(config);
    let aggregator = BalanceAggregator::new(connections.shielded_source(path)?);
    let aggregate = aggregator.balances(&owners).await;

    println!();
    println!("{}", "Shielded Balance Summary".yellow().bold());
    println!();
    for entry in &aggregate.per_key {
        let address = truncate_address(&entry.owner.to_string());
        match &entry.error {
            None => println!(
                "  {}  {} SOL",
                address,
                format!("{:.9}", entry.balance.as_sol()).green()
            ),
            Some(e) => println!("  {}  {}", address, e.user_message().red()),
        }
    }
    println!();
    println!(
        "Total:     {} SOL",
        format!("{:.9}", aggregate.total.as_sol()).green()
    );

    let failed = aggregate.failures().count();
    if failed > 0 {
        println!(
            "{}",
            format!("{failed} lookup(s) failed and counted as zero.").dimmed()
        );
    }

    Ok(())
}
