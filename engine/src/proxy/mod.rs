//! HTTP-facing pieces: wire contracts, the proxy endpoints and the Solana
//! Action served next to them

pub mod actions;
pub mod service;
pub mod wire;

pub use service::{ProxyReply, ProxyService, CONFIRM_PAYMENT_PATH};
