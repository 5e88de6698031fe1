//! Per-wallet stealth identity cache
//!
//! Deriving a stealth key asks the wallet for a signature, which is an
//! interactive step for hardware and browser wallets. A session remembers
//! the result for the wallet that produced it and forgets it when the
//! wallet changes or disconnects.

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::EngineError;
use crate::stealth::{derive_stealth_keypair, StealthKeypair, STEALTH_DERIVATION_MESSAGE};

#[derive(Debug, Default)]
pub struct StealthSession {
    current: Option<(Pubkey, StealthKeypair)>,
}

impl StealthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached identity for `wallet`, deriving it on a miss.
    ///
    /// `sign` receives the derivation message and must return the wallet's
    /// signature over it. It is not called when the cache already holds
    /// this wallet's identity.
    pub fn get_or_derive<F>(&mut self, wallet: &Pubkey, sign: F) -> Result<&StealthKeypair, EngineError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, EngineError>,
    {
        let cached = matches!(&self.current, Some((owner, _)) if owner == wallet);
        if !cached {
            debug!(wallet = %wallet, "deriving stealth identity");
            let signature = sign(STEALTH_DERIVATION_MESSAGE.as_bytes())?;
            let keypair = derive_stealth_keypair(&signature)?;
            self.current = Some((*wallet, keypair));
        }

        match &self.current {
            Some((_, keypair)) => Ok(keypair),
            None => Err(EngineError::InvalidInput("stealth session is empty".to_string())),
        }
    }

    /// Identity cached for `wallet`, if any
    pub fn current(&self, wallet: &Pubkey) -> Option<&StealthKeypair> {
        match &self.current {
            Some((owner, keypair)) if owner == wallet => Some(keypair),
            _ => None,
        }
    }

    /// Forget the cached identity (wallet disconnected)
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
