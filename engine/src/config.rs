//! Engine configuration
//!
//! Loaded from `~/.nudge/config.json` when present, then overridden by the
//! environment. The RPC endpoint is optional here on purpose: its absence
//! only becomes an error when a client is first requested.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::deadline::Deadlines;
use crate::error::EngineError;

/// Default directory for Nudge settings
const NUDGE_DIR: &str = ".nudge";
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the RPC endpoint
pub const RPC_URL_ENV: &str = "NUDGE_RPC_URL";
/// Environment variable holding the proxy base URL
pub const PROXY_URL_ENV: &str = "NUDGE_PROXY_URL";

/// Minimum deposit (0.001 SOL). Smaller compressed accounts cost more to
/// spend than they hold.
pub const MIN_DEPOSIT_LAMPORTS: u64 = 1_000_000;

/// Cluster the engine talks to; selects the state tree lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Mainnet,
    Localnet,
}

impl Cluster {
    /// (active, nullified) state tree lookup tables
    fn lookup_tables(self) -> Option<(&'static str, Option<&'static str>)> {
        match self {
            Cluster::Devnet => Some((
                "Dk9mNkbiZXJZ4By8DfSP6HEE4ojZzRvucwpawLeuwq8q",
                Some("AXbHzp1NgjLvpfnD6JRTTovXZ7APUGaBVYrwxa5wH3EU"),
            )),
            Cluster::Mainnet => Some(("7i86eQs3GSqHjN47WdWLTCGMW6gde1q96G2EVnUyK2KF", None)),
            Cluster::Localnet => None,
        }
    }
}

impl FromStr for Cluster {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(EngineError::Configuration(format!("unknown cluster '{other}'"))),
        }
    }
}

/// Where state tree infos come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTreeSource {
    /// Read (tree, queue, cpi context) triples from address lookup tables
    LookupTables {
        active: Pubkey,
        nullified: Option<Pubkey>,
    },
    /// The single default tree a local validator is started with
    Localnet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// One endpoint serves standard RPC, the compression API and the prover
    pub rpc_url: Option<String>,
    /// Base URL of the proxy endpoints, used for the delegated path
    pub proxy_url: Option<String>,
    pub cluster: Cluster,
    /// Overrides the cluster's active lookup table
    pub state_tree_lookup_table: Option<String>,
    /// Overrides the cluster's nullified lookup table
    pub nullified_state_tree_lookup_table: Option<String>,
    pub min_deposit_lamports: u64,
    pub deadlines: Deadlines,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            proxy_url: None,
            cluster: Cluster::Devnet,
            state_tree_lookup_table: None,
            nullified_state_tree_lookup_table: None,
            min_deposit_lamports: MIN_DEPOSIT_LAMPORTS,
            deadlines: Deadlines::default(),
        }
    }
}

/// Get the Nudge settings directory
pub fn nudge_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(NUDGE_DIR))
}

/// Get the default config file path
pub fn config_file() -> Option<PathBuf> {
    nudge_dir().map(|dir| dir.join(CONFIG_FILE))
}

impl EngineConfig {
    /// Load from the default file (if any), then apply the environment
    pub fn load() -> Result<Self, EngineError> {
        let mut config = match config_file() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load from a specific file without consulting the environment
    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let json = fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            EngineError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Configuration(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            EngineError::Configuration(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Environment wins over the file; empty values count as unset
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(RPC_URL_ENV) {
            self.rpc_url = Some(url);
        }
        if let Some(url) = non_empty_env(PROXY_URL_ENV) {
            self.proxy_url = Some(url);
        }
    }

    /// The RPC endpoint, or a fatal configuration error
    pub fn rpc_url(&self) -> Result<&str, EngineError> {
        match self.rpc_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(EngineError::Configuration("RPC URL not configured".to_string())),
        }
    }

    pub fn proxy_url(&self) -> Result<&str, EngineError> {
        match self.proxy_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.trim_end_matches('/')),
            _ => Err(EngineError::Configuration("proxy URL not configured".to_string())),
        }
    }

    pub fn state_tree_source(&self) -> Result<StateTreeSource, EngineError> {
        let preset = self.cluster.lookup_tables();

        let active = match (&self.state_tree_lookup_table, preset) {
            (Some(custom), _) => custom.as_str(),
            (None, Some((active, _))) => active,
            (None, None) => return Ok(StateTreeSource::Localnet),
        };
        let nullified = match (&self.nullified_state_tree_lookup_table, preset) {
            (Some(custom), _) => Some(custom.as_str()),
            (None, Some((_, nullified))) => nullified,
            (None, None) => None,
        };

        Ok(StateTreeSource::LookupTables {
            active: parse_table(active)?,
            nullified: nullified.map(parse_table).transpose()?,
        })
    }
}

fn parse_table(address: &str) -> Result<Pubkey, EngineError> {
    Pubkey::from_str(address).map_err(|_| {
        EngineError::Configuration(format!("invalid lookup table address '{address}'"))
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_missing_rpc_url_is_configuration_error() {
        let config = EngineConfig::default();
        let err = config.rpc_url().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());

        let blank = EngineConfig {
            rpc_url: Some("   ".to_string()),
            ..EngineConfig::default()
        };
        assert!(blank.rpc_url().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let config = EngineConfig {
            rpc_url: Some("https://devnet.example.com".to_string()),
            cluster: Cluster::Localnet,
            min_deposit_lamports: 5_000_000,
            ..EngineConfig::default()
        };
        config.save_to(&path).expect("Should save config");

        let loaded = EngineConfig::load_from(&path).expect("Should load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "rpcUrl": "http://127.0.0.1:8899" }"#).unwrap();

        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded.rpc_url().unwrap(), "http://127.0.0.1:8899");
        assert_eq!(loaded.min_deposit_lamports, MIN_DEPOSIT_LAMPORTS);
        assert_eq!(loaded.deadlines, Deadlines::default());
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_state_tree_source_presets() {
        let localnet = EngineConfig {
            cluster: Cluster::Localnet,
            ..EngineConfig::default()
        };
        assert_eq!(localnet.state_tree_source().unwrap(), StateTreeSource::Localnet);

        let devnet = EngineConfig::default();
        match devnet.state_tree_source().unwrap() {
            StateTreeSource::LookupTables { nullified, .. } => assert!(nullified.is_some()),
            other => panic!("unexpected source {other:?}"),
        }

        let custom = EngineConfig {
            cluster: Cluster::Localnet,
            state_tree_lookup_table: Some(Pubkey::new_unique().to_string()),
            ..EngineConfig::default()
        };
        assert!(matches!(
            custom.state_tree_source().unwrap(),
            StateTreeSource::LookupTables { nullified: None, .. }
        ));

        let broken = EngineConfig {
            state_tree_lookup_table: Some("not-a-key".to_string()),
            ..EngineConfig::default()
        };
        assert!(broken.state_tree_source().is_err());
    }

    #[test]
    fn test_cluster_parsing() {
        assert_eq!("mainnet-beta".parse::<Cluster>().unwrap(), Cluster::Mainnet);
        assert_eq!("Devnet".parse::<Cluster>().unwrap(), Cluster::Devnet);
        assert!("testnet".parse::<Cluster>().is_err());
    }
}
