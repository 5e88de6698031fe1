//! Nudge shielded-transfer engine
//!
//! Payees receive SOL at one-time stealth addresses as Light Protocol
//! compressed accounts and later unshield the whole balance to their main
//! wallet. The stealth identity is derived from a wallet signature, so it
//! never has to be stored.
//!
//! Flow:
//! 1. [`stealth::derive_stealth_keypair`] from the wallet's signature over
//!    [`stealth::STEALTH_DERIVATION_MESSAGE`]
//! 2. Senders pay with [`deposit::DepositBuilder`]
//! 3. [`balance::BalanceAggregator`] reports what has arrived
//! 4. [`unshield::UnshieldBuilder`] builds the withdrawal, signed by the
//!    stealth key and the fee payer

pub mod balance;
pub mod config;
pub mod connection;
pub mod deadline;
pub mod deposit;
pub mod error;
pub mod instruction;
pub mod ownership;
pub mod proxy;
pub mod registry;
pub mod rpc;
pub mod selection;
pub mod session;
pub mod stealth;
pub mod transaction;
pub mod tree;
pub mod types;
pub mod unshield;

#[cfg(test)]
mod tests;



pub use balance::{AggregateBalance, Balance, BalanceAggregator};
pub use config::EngineConfig;
pub use connection::{DataPath, LedgerConnections};
pub use error::{EngineError, ErrorKind};
pub use stealth::{derive_stealth_keypair, StealthKeypair, STEALTH_DERIVATION_MESSAGE};
pub use transaction::UnsignedTransaction;
pub use types::{CompressedAccount, TreeInfo, UnshieldInputs, ValidityProof};
