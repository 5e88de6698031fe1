//! Derive and show the stealth address

use anyhow::Result;
use colored::Colorize;
use solana_sdk::signer::Signer;

use crate::config::{load_solana_keypair, stealth_identity};

pub fn run(keypair_path: Option<&str>) -> Result<()> {
    let wallet = load_solana_keypair(keypair_path)?;
    let stealth = stealth_identity(&wallet)?;

    println!();
    println!("{}", "Stealth Identity".yellow().bold());
    println!();
    println!("Wallet:  {}", wallet.pubkey());
    println!("Stealth: {}", stealth.public_key().to_string().green());
    println!();
    println!(
        "{}",
        "Derived from your wallet's signature; nothing was written to disk.".dimmed()
    );

    Ok(())
}
