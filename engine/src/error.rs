//! Error taxonomy for the shielded-transfer engine
//!
//! Every public operation fails with exactly one [`EngineError`]. Each error
//! maps onto an [`ErrorKind`], which carries the stable code, the
//! plain-language message shown to users and the retry policy.
//!
//! No variant ever carries secret key material.

use std::time::Duration;

use solana_sdk::native_token::LAMPORTS_PER_SOL;
use thiserror::Error;

/// Classification of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or unusable configuration (fatal)
    Configuration,
    /// Transport failure reaching the ledger or indexer
    Connection,
    /// A deadline fired before the operation settled
    Timeout,
    /// Validity-proof service or ownership-proof step failed
    ProofGeneration,
    /// Available funds below the requested amount
    InsufficientBalance,
    /// No compressed accounts (or only empty ones) for the stealth key
    NoShieldedFunds,
    /// A supplied string is not a valid ledger address
    InvalidAddress,
    /// Any other caller input rejected before touching the network
    InvalidInput,
    /// Catch-all for instruction/transaction construction failures
    TransactionBuild,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::Configuration,
        ErrorKind::Connection,
        ErrorKind::Timeout,
        ErrorKind::ProofGeneration,
        ErrorKind::InsufficientBalance,
        ErrorKind::NoShieldedFunds,
        ErrorKind::InvalidAddress,
        ErrorKind::InvalidInput,
        ErrorKind::TransactionBuild,
    ];

    /// Inverse of [`ErrorKind::code`]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::Connection => "RPC_CONNECTION_FAILED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ProofGeneration => "PROOF_GENERATION_FAILED",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::NoShieldedFunds => "NO_SHIELDED_FUNDS",
            ErrorKind::InvalidAddress => "INVALID_ADDRESS",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::TransactionBuild => "TRANSACTION_BUILD_FAILED",
        }
    }

    /// Whether retrying the same request can succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::ProofGeneration
        )
    }

    /// Message suitable for end users
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Configuration => {
                "Application not configured correctly. Please contact the administrator."
            }
            ErrorKind::Connection => {
                "Unable to connect to Solana network. Please check your internet connection and try again."
            }
            ErrorKind::Timeout => "The network took too long to respond. Please try again.",
            ErrorKind::ProofGeneration => {
                "Failed to generate ZK proof. The prover service may be busy. Please wait a moment and try again."
            }
            ErrorKind::InsufficientBalance => {
                "Insufficient shielded balance for this withdrawal."
            }
            ErrorKind::NoShieldedFunds => {
                "No shielded funds found in this stealth address. Share your link to receive private payments."
            }
            ErrorKind::InvalidAddress => {
                "The provided wallet address is invalid. Please check and try again."
            }
            ErrorKind::InvalidInput => "The request is invalid. Please check the values and try again.",
            ErrorKind::TransactionBuild => {
                "Failed to build transaction. Please try again or contact support if the issue persists."
            }
        }
    }
}

/// Engine failure
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("RPC connection failed: {0}")]
    Connection(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("validity proof generation failed: {0}")]
    ValidityProof(String),

    #[error("ownership proof generation failed: {0}")]
    OwnershipProof(String),

    #[error("insufficient balance: required {required} lamports, available {available} lamports")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("no shielded funds found")]
    NoShieldedFunds,

    #[error("invalid Solana address: {0}")]
    InvalidAddress(String),

    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("amount too small: minimum is {minimum} lamports")]
    AmountTooSmall { minimum: u64 },

    #[error("signature too short: need at least 32 bytes, got {0}")]
    InvalidSignature(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transaction not confirmed: {0}")]
    UnconfirmedTransaction(String),

    #[error("no usable state tree advertised by the ledger")]
    NoUsableStateTree,

    #[error("transaction is missing {missing} required signature(s)")]
    IncompleteSignatures { missing: usize },

    #[error("transaction build failed: {0}")]
    TransactionBuild(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Configuration(_) => ErrorKind::Configuration,
            EngineError::Connection(_) | EngineError::NoUsableStateTree => ErrorKind::Connection,
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            EngineError::ValidityProof(_) | EngineError::OwnershipProof(_) => {
                ErrorKind::ProofGeneration
            }
            EngineError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            EngineError::NoShieldedFunds => ErrorKind::NoShieldedFunds,
            EngineError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            EngineError::InvalidAmount
            | EngineError::AmountTooSmall { .. }
            | EngineError::InvalidSignature(_)
            | EngineError::InvalidInput(_)
            | EngineError::UnconfirmedTransaction(_) => ErrorKind::InvalidInput,
            EngineError::IncompleteSignatures { .. } | EngineError::TransactionBuild(_) => {
                ErrorKind::TransactionBuild
            }
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Message suitable for end users; amount problems say what to fix
    pub fn user_message(&self) -> String {
        match self {
            EngineError::AmountTooSmall { minimum } => format!(
                "Minimum transfer amount is {} SOL.",
                *minimum as f64 / LAMPORTS_PER_SOL as f64
            ),
            EngineError::InvalidAmount => "Amount must be a positive number of SOL.".to_string(),
            other => other.kind().user_message().to_string(),
        }
    }

    /// Classify an opaque failure message (e.g. relayed by the proxy)
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("proof") || lower.contains("prover") {
            EngineError::ValidityProof(message.to_string())
        } else if lower.contains("connection") || lower.contains("fetch") || lower.contains("rpc") {
            EngineError::Connection(message.to_string())
        } else {
            EngineError::TransactionBuild(message.to_string())
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Timeout {
                operation: "HTTP request",
                after: Duration::ZERO,
            }
        } else if err.is_decode() {
            EngineError::Connection(format!("malformed response: {err}"))
        } else {
            EngineError::Connection(err.to_string())
        }
    }
}

impl From<solana_client::client_error::ClientError> for EngineError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        EngineError::Connection(err.to_string())
    }
}
