//! Wallet and settings loading for the Nudge CLI

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use nudge_engine::{
    derive_stealth_keypair, EngineConfig, StealthKeypair, STEALTH_DERIVATION_MESSAGE,
};
use solana_sdk::signature::{Keypair, Signer};

/// Default Solana keypair location
pub fn default_keypair_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Could not find home directory")?
        .join(".config")
        .join("solana")
        .join("id.json"))
}

/// Load Solana keypair from file or default location
pub fn load_solana_keypair(path: Option<&str>) -> Result<Keypair> {
    let keypair_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_keypair_path()?,
    };

    if !keypair_path.exists() {
        bail!(
            "Solana keypair not found at {:?}. Generate one with 'solana-keygen new' or specify path with --keypair",
            keypair_path
        );
    }

    let keypair_json = fs::read_to_string(&keypair_path)
        .with_context(|| format!("Failed to read keypair file {:?}", keypair_path))?;
    let bytes: Vec<u8> =
        serde_json::from_str(&keypair_json).context("Keypair file is not a JSON byte array")?;
    let keypair = Keypair::from_bytes(&bytes).context("Keypair file holds an invalid keypair")?;

    Ok(keypair)
}

/// Stealth identity of `wallet`.
///
/// Ed25519 signatures are deterministic, so signing the fixed derivation
/// message gives the same identity on every run.
pub fn stealth_identity(wallet: &Keypair) -> Result<StealthKeypair> {
    let signature = wallet.sign_message(STEALTH_DERIVATION_MESSAGE.as_bytes());
    Ok(derive_stealth_keypair(signature.as_ref())?)
}

/// Load the engine settings and apply command-line overrides
pub fn engine_config(
    rpc_url: Option<&str>,
    proxy_url: Option<&str>,
    cluster: Option<&str>,
) -> Result<EngineConfig> {
    let config = EngineConfig::load().context("Failed to load Nudge configuration")?;
    apply_overrides(config, rpc_url, proxy_url, cluster)
}

/// Flags win over the file and the environment
pub fn apply_overrides(
    mut config: EngineConfig,
    rpc_url: Option<&str>,
    proxy_url: Option<&str>,
    cluster: Option<&str>,
) -> Result<EngineConfig> {
    if let Some(url) = rpc_url {
        config.rpc_url = Some(url.to_string());
    }
    if let Some(url) = proxy_url {
        config.proxy_url = Some(url.to_string());
    }
    if let Some(cluster) = cluster {
        config.cluster = cluster.parse()?;
    }
    Ok(config)
}
