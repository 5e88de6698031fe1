//! Server side of the proxy endpoints
//!
//! Handlers take the raw request body and return a status plus JSON body,
//! so any HTTP framework can mount them. Shielded reads go through
//! [`DirectSource`], the same code the direct path runs.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::wire::{
    BalanceRequest, BalanceResponse, ErrorResponse, UnshieldDataRequest, UnshieldDataResponse,
};
use crate::balance::Balance;
use crate::connection::{DataPath, LedgerConnections};
use crate::error::{EngineError, ErrorKind};
use crate::registry::{confirm_payment, PaymentConfirmation, PaymentRecorder, RecordOutcome};

pub const CONFIRM_PAYMENT_PATH: &str = "/api/payments/confirm";

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
}

impl ProxyReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::error_body(status, ErrorResponse::message(message))
    }

    fn error_body(status: u16, body: ErrorResponse) -> Self {
        Self {
            status,
            body: serde_json::to_value(body).unwrap_or(Value::Null),
        }
    }

    /// 404 for missing funds, 400 for rejected input, 500 otherwise
    pub fn from_error(err: &EngineError) -> Self {
        let status = match err.kind() {
            ErrorKind::NoShieldedFunds => 404,
            ErrorKind::InvalidInput | ErrorKind::InvalidAddress => 400,
            _ => 500,
        };
        if status == 500 {
            error!(code = err.code(), error = %err, "proxy request failed");
        } else {
            warn!(code = err.code(), error = %err, "proxy request rejected");
        }
        Self::error_body(status, ErrorResponse::from(err))
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProxyReply> {
    serde_json::from_slice(body).map_err(|_| ProxyReply::error(400, "Invalid JSON body"))
}

#[derive(Clone)]
pub struct ProxyService {
    connections: Arc<LedgerConnections>,
}

impl ProxyService {
    pub fn new(connections: Arc<LedgerConnections>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &Arc<LedgerConnections> {
        &self.connections
    }

    /// `POST /api/light/balance`
    pub async fn handle_balance(&self, body: &[u8]) -> ProxyReply {
        let request: BalanceRequest = match parse_body(body) {
            Ok(request) => request,
            Err(reply) => return reply,
        };
        match self.balance(&request).await {
            Ok(balance) => ProxyReply::ok(json!(BalanceResponse {
                balance: balance.as_sol()
            })),
            Err(e) => ProxyReply::from_error(&e),
        }
    }

    async fn balance(&self, request: &BalanceRequest) -> Result<Balance, EngineError> {
        let owner = request.owner()?;
        let source = self.connections.shielded_source(DataPath::Direct)?;
        let lamports = source.shielded_lamports(&owner).await?;
        Ok(Balance { lamports })
    }

    /// `POST /api/light/unshield-data`
    pub async fn handle_unshield_data(&self, body: &[u8]) -> ProxyReply {
        let request: UnshieldDataRequest = match parse_body(body) {
            Ok(request) => request,
            Err(reply) => return reply,
        };
        match self.unshield_data(&request).await {
            Ok(response) => ProxyReply::ok(json!(response)),
            Err(e) => ProxyReply::from_error(&e),
        }
    }

    async fn unshield_data(
        &self,
        request: &UnshieldDataRequest,
    ) -> Result<UnshieldDataResponse, EngineError> {
        let keys = request.keys()?;
        let source = self.connections.shielded_source(DataPath::Direct)?;
        let inputs = source
            .unshield_inputs(&keys.stealth, &keys.recipient, &keys.fee_payer)
            .await?;
        Ok(UnshieldDataResponse::from(&inputs))
    }

    /// `POST /api/payments/confirm`
    pub async fn handle_confirm_payment(
        &self,
        recorder: &dyn PaymentRecorder,
        body: &[u8],
    ) -> ProxyReply {
        let claim: PaymentConfirmation = match parse_body(body) {
            Ok(claim) => claim,
            Err(reply) => return reply,
        };
        match confirm_payment(&self.connections, recorder, claim).await {
            Ok(RecordOutcome::Recorded) => ProxyReply::ok(json!({ "ok": true })),
            Ok(RecordOutcome::Duplicate) => {
                ProxyReply::ok(json!({ "ok": true, "status": "duplicate" }))
            }
            Err(e) => ProxyReply::from_error(&e),
        }
    }
}
