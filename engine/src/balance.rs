//! Shielded balance lookups

use std::sync::Arc;

use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::EngineError;
use crate::rpc::ShieldedSource;
use crate::types::CompressedAccount;

/// Sum account balances without losing precision
pub fn sum_lamports(accounts: &[CompressedAccount]) -> Result<u64, EngineError> {
    let total: u128 = accounts.iter().map(|a| u128::from(a.lamports)).sum();
    u64::try_from(total)
        .map_err(|_| EngineError::InvalidInput("compressed balance exceeds u64".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    pub lamports: u64,
}

impl Balance {
    /// Display value in SOL. Conversion happens once, after summing.
    pub fn as_sol(&self) -> f64 {
        self.lamports as f64 / LAMPORTS_PER_SOL as f64
    }
}

/// Balance of one key inside an aggregate
#[derive(Debug)]
pub struct KeyBalance {
    pub owner: Pubkey,
    pub balance: Balance,
    /// Set when the lookup failed; the key then contributes zero
    pub error: Option<EngineError>,
}

#[derive(Debug)]
pub struct AggregateBalance {
    pub total: Balance,
    /// One entry per requested key, in request order
    pub per_key: Vec<KeyBalance>,
}

impl AggregateBalance {
    pub fn failures(&self) -> impl Iterator<Item = &KeyBalance> {
        self.per_key.iter().filter(|entry| entry.error.is_some())
    }
}

#[derive(Clone)]
pub struct BalanceAggregator {
    source: Arc<dyn ShieldedSource>,
}

impl BalanceAggregator {
    pub fn new(source: Arc<dyn ShieldedSource>) -> Self {
        Self { source }
    }

    /// Shielded balance of a single key; no accounts means zero
    pub async fn balance(&self, owner: &Pubkey) -> Result<Balance, EngineError> {
        let lamports = self.source.shielded_lamports(owner).await?;
        Ok(Balance { lamports })
    }

    /// Look up every key concurrently and add the results.
    ///
    /// A failed lookup contributes zero and is recorded on its entry; it
    /// never cancels the others.
    pub async fn balances(&self, owners: &[Pubkey]) -> AggregateBalance {
        let mut tasks = JoinSet::new();
        for (index, owner) in owners.iter().copied().enumerate() {
            let source = Arc::clone(&self.source);
            tasks.spawn(async move { (index, source.shielded_lamports(&owner).await) });
        }

        let mut results: Vec<Option<Result<u64, EngineError>>> =
            owners.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "balance lookup task failed"),
            }
        }

        let mut total: u128 = 0;
        let per_key = owners
            .iter()
            .zip(results)
            .map(|(owner, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(EngineError::Connection("balance lookup aborted".to_string()))
                });
                match result {
                    Ok(lamports) => {
                        total += u128::from(lamports);
                        KeyBalance {
                            owner: *owner,
                            balance: Balance { lamports },
                            error: None,
                        }
                    }
                    Err(error) => {
                        warn!(owner = %owner, error = %error, "balance lookup failed");
                        KeyBalance {
                            owner: *owner,
                            balance: Balance::default(),
                            error: Some(error),
                        }
                    }
                }
            })
            .collect();

        AggregateBalance {
            total: Balance {
                lamports: u64::try_from(total).unwrap_or(u64::MAX),
            },
            per_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::account_with;

    #[test]
    fn test_sum_is_exact() {
        let accounts: Vec<_> = [1, 2, 3].into_iter().map(account_with).collect();
        assert_eq!(sum_lamports(&accounts).unwrap(), 6);
        assert_eq!(sum_lamports(&[]).unwrap(), 0);
    }

    #[test]
    fn test_sum_overflow_is_error() {
        let accounts: Vec<_> = [u64::MAX, 1].into_iter().map(account_with).collect();
        assert!(sum_lamports(&accounts).is_err());
    }

    #[test]
    fn test_sol_conversion_after_summing() {
        let balance = Balance {
            lamports: 1_500_000_000,
        };
        assert_eq!(balance.as_sol(), 1.5);
        assert_eq!(Balance::default().as_sol(), 0.0);
    }
}
