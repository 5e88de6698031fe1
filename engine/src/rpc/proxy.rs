//! Shielded reads delegated to a proxy
//!
//! The proxy runs the same algorithm server side (see
//! [`crate::proxy::service`]) and returns JSON; this source only rebuilds the
//! byte buffers and maps HTTP statuses back onto engine errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tracing::debug;

use super::ShieldedSource;
use crate::deadline::{with_deadline, Deadlines};
use crate::error::{EngineError, ErrorKind};
use crate::proxy::wire::{
    BalanceRequest, BalanceResponse, ErrorResponse, UnshieldDataRequest, UnshieldDataResponse,
};
use crate::types::UnshieldInputs;

pub const BALANCE_PATH: &str = "/api/light/balance";
pub const UNSHIELD_DATA_PATH: &str = "/api/light/unshield-data";

#[derive(Clone)]
pub struct ProxySource {
    http: reqwest::Client,
    base_url: String,
    deadlines: Deadlines,
}

impl ProxySource {
    pub fn new(base_url: &str, deadlines: Deadlines) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            deadlines,
        }
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "proxy request");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.json::<ErrorResponse>().await.ok();
        Err(relayed_error(status, body))
    }
}

/// Rebuild the engine error behind a proxy failure.
///
/// Coded bodies map back onto the same kind. A reply without a readable
/// body never came from the engine (wrong URL, gateway in between) and is
/// a transport failure whatever its status.
fn relayed_error(status: StatusCode, body: Option<ErrorResponse>) -> EngineError {
    let Some(body) = body else {
        return EngineError::Connection(format!("proxy returned HTTP {status}"));
    };

    let Some(kind) = body.code.as_deref().and_then(ErrorKind::from_code) else {
        return match status {
            StatusCode::NOT_FOUND => EngineError::NoShieldedFunds,
            StatusCode::BAD_REQUEST => EngineError::InvalidInput(body.error),
            _ => EngineError::classify(&body.error),
        };
    };

    let message = body.error;
    match kind {
        ErrorKind::Configuration => EngineError::Configuration(message),
        ErrorKind::Connection => EngineError::Connection(message),
        ErrorKind::Timeout => EngineError::Timeout {
            operation: "proxy request",
            after: Duration::from_millis(body.after_ms.unwrap_or_default()),
        },
        ErrorKind::ProofGeneration => EngineError::ValidityProof(message),
        ErrorKind::InsufficientBalance => EngineError::InsufficientBalance {
            required: body.required.unwrap_or_default(),
            available: body.available.unwrap_or_default(),
        },
        ErrorKind::NoShieldedFunds => EngineError::NoShieldedFunds,
        ErrorKind::InvalidAddress => EngineError::InvalidAddress(message),
        ErrorKind::InvalidInput => EngineError::InvalidInput(message),
        ErrorKind::TransactionBuild => EngineError::TransactionBuild(message),
    }
}

fn sol_to_lamports(sol: f64) -> Result<u64, EngineError> {
    if !sol.is_finite() || sol < 0.0 {
        return Err(EngineError::InvalidInput(format!("proxy reported balance {sol}")));
    }
    Ok((sol * LAMPORTS_PER_SOL as f64).round() as u64)
}

#[async_trait]
impl ShieldedSource for ProxySource {
    async fn shielded_lamports(&self, owner: &Pubkey) -> Result<u64, EngineError> {
        let request = BalanceRequest {
            public_key: Some(owner.to_string()),
        };
        let response: BalanceResponse = with_deadline(
            "proxy balance",
            self.deadlines.rpc(),
            self.post(BALANCE_PATH, &request),
        )
        .await?;
        sol_to_lamports(response.balance)
    }

    async fn unshield_inputs(
        &self,
        stealth: &Pubkey,
        recipient: &Pubkey,
        fee_payer: &Pubkey,
    ) -> Result<UnshieldInputs, EngineError> {
        let request = UnshieldDataRequest {
            stealth_public_key: Some(stealth.to_string()),
            recipient_public_key: Some(recipient.to_string()),
            fee_payer: Some(fee_payer.to_string()),
        };
        // The proxy fetches accounts and a proof in one round trip
        let limit = self.deadlines.rpc() + self.deadlines.proof();
        let response: UnshieldDataResponse = with_deadline(
            "proxy unshield data",
            limit,
            self.post(UNSHIELD_DATA_PATH, &request),
        )
        .await?;

        let inputs = UnshieldInputs::try_from(response)?;
        if inputs.selected_accounts.iter().any(|a| a.owner != *stealth) {
            return Err(EngineError::InvalidInput(
                "proxy returned accounts not owned by the stealth key".to_string(),
            ));
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyReply;

    fn one_of_each_kind() -> Vec<EngineError> {
        vec![
            EngineError::Configuration("RPC URL not configured".into()),
            EngineError::Connection("connection reset".into()),
            EngineError::Timeout {
                operation: "validity proof",
                after: Duration::from_secs(60),
            },
            EngineError::ValidityProof("prover busy".into()),
            EngineError::InsufficientBalance {
                required: 2_000,
                available: 1_500,
            },
            EngineError::NoShieldedFunds,
            EngineError::InvalidAddress("not-a-key".into()),
            EngineError::InvalidInput("Missing required fields".into()),
            EngineError::TransactionBuild("instruction too large".into()),
        ]
    }

    fn relay(err: &EngineError) -> EngineError {
        let reply = ProxyReply::from_error(err);
        let status = StatusCode::from_u16(reply.status).unwrap();
        let body: ErrorResponse = serde_json::from_value(reply.body).unwrap();
        relayed_error(status, Some(body))
    }

    #[test]
    fn test_every_kind_survives_the_proxy() {
        let errors = one_of_each_kind();
        for kind in ErrorKind::ALL {
            assert!(errors.iter().any(|e| e.kind() == kind), "no sample for {kind:?}");
        }

        for direct in &errors {
            let proxied = relay(direct);
            assert_eq!(proxied.kind(), direct.kind(), "{direct}");
            assert_eq!(proxied.is_retryable(), direct.is_retryable(), "{direct}");
        }
    }

    #[test]
    fn test_relayed_details_are_kept() {
        let proxied = relay(&EngineError::InsufficientBalance {
            required: 2_000,
            available: 1_500,
        });
        assert!(matches!(
            proxied,
            EngineError::InsufficientBalance { required: 2_000, available: 1_500 }
        ));

        let proxied = relay(&EngineError::Timeout {
            operation: "validity proof",
            after: Duration::from_secs(60),
        });
        assert!(matches!(proxied, EngineError::Timeout { after, .. } if after == Duration::from_secs(60)));
    }

    #[test]
    fn test_unreadable_reply_is_a_connection_error() {
        for status in [StatusCode::NOT_FOUND, StatusCode::BAD_GATEWAY, StatusCode::BAD_REQUEST] {
            let err = relayed_error(status, None);
            assert_eq!(err.kind(), ErrorKind::Connection, "{status}");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_uncoded_replies_fall_back_to_status() {
        assert!(matches!(
            relayed_error(
                StatusCode::NOT_FOUND,
                Some(ErrorResponse::message("No shielded funds found"))
            ),
            EngineError::NoShieldedFunds
        ));
        assert_eq!(
            relayed_error(
                StatusCode::BAD_REQUEST,
                Some(ErrorResponse::message("Invalid JSON body"))
            )
            .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            relayed_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(ErrorResponse::message("prover timeout"))
            )
            .kind(),
            ErrorKind::ProofGeneration
        );
    }

    #[tokio::test]
    async fn test_malformed_proxy_reply_is_a_connection_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                      content-length: 8\r\nconnection: close\r\n\r\nnot json",
                )
                .await;
        });

        let source = ProxySource::new(&format!("http://{addr}"), Deadlines::default());
        let err = source
            .shielded_lamports(&Pubkey::new_unique())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_sol_to_lamports() {
        assert_eq!(sol_to_lamports(1.5).unwrap(), 1_500_000_000);
        assert_eq!(sol_to_lamports(0.001).unwrap(), 1_000_000);
        assert_eq!(sol_to_lamports(0.0).unwrap(), 0);
        assert!(sol_to_lamports(-1.0).is_err());
        assert!(sol_to_lamports(f64::NAN).is_err());
    }
}
