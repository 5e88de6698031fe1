//! Solana Action ("blink") for paying a stealth address
//!
//! `GET` describes the action so wallets can render buttons; `POST` takes
//! the sender's wallet and returns an unsigned shielded deposit for it to
//! sign.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use super::service::{parse_body, ProxyReply};
use crate::connection::LedgerConnections;
use crate::deposit::DepositBuilder;

pub const ACTION_PATH: &str = "/api/actions/nudge";

/// Preset amounts offered as buttons, in SOL
const PRESET_AMOUNTS: [&str; 2] = ["0.1", "0.5"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub name: String,
    pub label: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLinks {
    pub actions: Vec<LinkedAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionGetResponse {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub label: String,
    pub links: ActionLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPostRequest {
    pub account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPostResponse {
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 serialized versioned transaction
    pub transaction: String,
    pub message: String,
}

fn transaction_action(label: String, href: String) -> LinkedAction {
    LinkedAction {
        kind: "transaction".to_string(),
        label,
        href,
        parameters: Vec::new(),
    }
}

/// Build the action description for stealth address `id`
pub fn action_metadata(host_url: &str, id: &str) -> ActionGetResponse {
    let mut actions: Vec<LinkedAction> = PRESET_AMOUNTS
        .iter()
        .map(|amount| {
            transaction_action(
                format!("Send {amount} SOL"),
                format!("{ACTION_PATH}?id={id}&amount={amount}"),
            )
        })
        .collect();

    let mut custom = transaction_action(
        "Send Custom Amount".to_string(),
        format!("{ACTION_PATH}?id={id}&amount={{amount}}"),
    );
    custom.parameters.push(ActionParameter {
        name: "amount".to_string(),
        label: "Enter Amount (SOL)".to_string(),
        required: true,
    });
    actions.push(custom);

    ActionGetResponse {
        icon: format!("{}/nudge-logo.png", host_url.trim_end_matches('/')),
        title: "Nudge: Private Transfer".to_string(),
        description: "Send SOL privately. The recipient's main wallet remains hidden. \
                      Funds are shielded immediately using Light Protocol compression."
            .to_string(),
        label: "Nudge (Shielded)".to_string(),
        links: ActionLinks { actions },
    }
}

/// `GET /api/actions/nudge?id=<stealth>`
pub fn handle_action_get(host_url: &str, id: Option<&str>) -> ProxyReply {
    let Some(id) = id else {
        return ProxyReply::error(400, "Missing 'id' parameter in URL");
    };
    if Pubkey::from_str(id).is_err() {
        return ProxyReply::error(400, "Invalid stealth address format");
    }
    ProxyReply::ok(json!(action_metadata(host_url, id)))
}

/// `POST /api/actions/nudge?id=<stealth>&amount=<sol>`
pub async fn handle_action_post(
    connections: &LedgerConnections,
    id: Option<&str>,
    amount: Option<&str>,
    body: &[u8],
) -> ProxyReply {
    let request: ActionPostRequest = match parse_body(body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };

    let sender = match request.account.as_deref().map(Pubkey::from_str) {
        Some(Ok(sender)) => sender,
        _ => return ProxyReply::error(400, "Invalid sender wallet address"),
    };
    let Some(id) = id else {
        return ProxyReply::error(400, "Missing recipient stealth ID");
    };
    let Some(amount_str) = amount else {
        return ProxyReply::error(400, "Missing transfer amount");
    };
    let amount = match amount_str.trim().parse::<f64>() {
        Ok(amount) => amount,
        Err(_) => return ProxyReply::error(400, "Amount must be a positive number"),
    };

    let built = DepositBuilder::new(connections)
        .build_deposit(&sender, id, amount)
        .await
        .and_then(|tx| tx.serialize_base64());

    match built {
        Ok(transaction) => ProxyReply::ok(json!(ActionPostResponse {
            kind: "transaction".to_string(),
            transaction,
            message: format!("Sending {amount} SOL privately via Nudge. Funds will be shielded."),
        })),
        Err(e) => {
            warn!(code = e.code(), error = %e, "action transaction failed");
            ProxyReply::error(400, e.user_message())
        }
    }
}
