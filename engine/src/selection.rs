//! Choosing which compressed accounts to spend

use crate::error::EngineError;
use crate::types::CompressedAccount;

/// Accounts chosen to cover a target
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub accounts: Vec<CompressedAccount>,
    pub total: u64,
}

/// Pick the fewest accounts whose lamports reach `target`.
///
/// Accounts are taken largest first. Any k accounts sum to at most the k
/// largest, so the shortest prefix of the descending order that reaches the
/// target is a minimum-cardinality cover. Equal balances keep their input
/// order.
pub fn select_minimal(
    accounts: &[CompressedAccount],
    target: u64,
) -> Result<Selection, EngineError> {
    if target == 0 {
        return Ok(Selection::default());
    }

    let mut sorted: Vec<&CompressedAccount> = accounts.iter().collect();
    sorted.sort_by(|a, b| b.lamports.cmp(&a.lamports));

    let mut chosen = Vec::new();
    let mut total: u128 = 0;
    for account in sorted {
        chosen.push(account.clone());
        total += u128::from(account.lamports);
        if total >= u128::from(target) {
            // saturates only if the cover itself exceeds u64
            let total = u64::try_from(total).unwrap_or(u64::MAX);
            return Ok(Selection {
                accounts: chosen,
                total,
            });
        }
    }

    Err(EngineError::InsufficientBalance {
        required: target,
        available: u64::try_from(total).unwrap_or(u64::MAX),
    })
}
