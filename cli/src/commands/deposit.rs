//! Send SOL into a stealth address as a compressed account

use anyhow::Result;
use colored::Colorize;
use nudge_engine::deposit::DepositBuilder;
use nudge_engine::{EngineConfig, LedgerConnections};
use solana_sdk::signer::Signer;

use crate::config::load_solana_keypair;

pub async fn run(
    config: EngineConfig,
    keypair_path: Option<&str>,
    to: &str,
    amount: f64,
) -> Result<()> {
    println!("{}", "Preparing shielded deposit...".cyan());

    let payer = load_solana_keypair(keypair_path)?;
    let connections = LedgerConnections::new(config);

    let mut transaction = DepositBuilder::new(&connections)
        .build_deposit(&payer.pubkey(), to, amount)
        .await?;
    transaction.sign(&payer)?;

    println!("Sending {} SOL to {}...", amount, to);
    let signature = connections.submit(transaction).await?;

    println!();
    println!("{}", "Deposit confirmed".green().bold());
    println!("  Signature: {}", signature);
    println!(
        "{}",
        "The funds are shielded; the recipient's wallet is not linked on-chain.".dimmed()
    );

    Ok(())
}
