//! Show the shareable payment link

use anyhow::Result;
use colored::Colorize;
use nudge_engine::proxy::actions::ACTION_PATH;
use nudge_engine::stealth::truncate_address;

use crate::config::{load_solana_keypair, stealth_identity};

/// Action URL paying `stealth` through the server at `host`
pub fn payment_link(host: &str, stealth: &str) -> String {
    format!("{}{ACTION_PATH}?id={stealth}", host.trim_end_matches('/'))
}

pub fn run(keypair_path: Option<&str>, host: &str) -> Result<()> {
    let wallet = load_solana_keypair(keypair_path)?;
    let stealth = stealth_identity(&wallet)?.public_key().to_string();

    println!();
    println!("{}", "Your Payment Link".yellow().bold());
    println!();
    println!("{}", payment_link(host, &stealth).green());
    println!();
    println!("Stealth address: {}", truncate_address(&stealth));
    println!(
        "{}",
        "Payers never see your main wallet. Run 'nudge serve' to host the link.".dimmed()
    );

    Ok(())
}
