//! BIP70-style payment requests over the JSON payment protocol.
//!
//! A request carries one or more outputs, an optional expiry and an optional
//! payment URL. Paying one means building the transaction as usual, then —
//! when a payment URL is declared — POSTing the raw transaction for a
//! merchant ACK before (not instead of) broadcasting on-chain.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::Network;
use crate::transaction::{Destination, Output, OutputValue};

/// Sent by `send_payment` when no payment URL is declared; callers treat it
/// as "merchant does not want the transaction POSTed" and proceed with the
/// chain broadcast alone.
pub const NO_URL: &str = "no url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrOutput {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub outputs: Vec<PrOutput>,
    /// Unix timestamp after which the request must not be paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default)]
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requestor: Option<String>,
    #[serde(default)]
    pub id: String,
}

#[derive(Serialize)]
struct Payment<'a> {
    transactions: Vec<&'a str>,
    refund_to: Vec<&'a str>,
    memo: &'a str,
}

#[derive(Deserialize)]
struct PaymentAck {
    #[serde(default)]
    memo: String,
}

impl PaymentRequest {
    /// Fetch a request from a BIP72 `r=` URL.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<PaymentRequest> {
        let response = client
            .get(url)
            .header("Accept", "application/payment-request")
            .send()
            .await
            .map_err(|e| Error::PaymentRequest(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::PaymentRequest(format!(
                "status {}",
                response.status()
            )));
        }
        response
            .json::<PaymentRequest>()
            .await
            .map_err(|e| Error::PaymentRequest(format!("bad payment request: {}", e)))
    }

    pub fn has_expired(&self) -> bool {
        match self.expires {
            Some(t) => t < chrono::Utc::now().timestamp(),
            None => false,
        }
    }

    pub fn amount(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Display identity: the signed requestor when present, else the first
    /// output address.
    pub fn requestor(&self) -> String {
        self.requestor
            .clone()
            .or_else(|| self.outputs.first().map(|o| o.address.clone()))
            .unwrap_or_default()
    }

    pub fn id(&self) -> String {
        if self.id.is_empty() {
            self.requestor()
        } else {
            self.id.clone()
        }
    }

    /// Structural validation before the request takes over the send form.
    pub fn verify(&self, network: Network) -> Result<()> {
        if self.outputs.is_empty() {
            return Err(Error::PaymentRequest("request has no outputs".into()));
        }
        for out in &self.outputs {
            crate::address::parse_address(&out.address, network)
                .map_err(|e| Error::PaymentRequest(format!("bad output address: {}", e)))?;
        }
        Ok(())
    }

    /// Outputs in builder form.
    pub fn to_outputs(&self, network: Network) -> Result<Vec<Output>> {
        self.outputs
            .iter()
            .map(|o| {
                let parsed = crate::address::parse_address(&o.address, network)?;
                Ok(Output {
                    destination: Destination::Address(parsed.address),
                    value: OutputValue::Sats(o.amount),
                })
            })
            .collect()
    }

    /// POST the signed transaction to the declared payment URL.
    ///
    /// Returns `(false, "no url")` when the merchant declared no endpoint;
    /// the caller proceeds with the chain broadcast and relies on its
    /// status alone. A present ACK memo is preferred over the broadcast
    /// message downstream.
    pub async fn send_payment(
        &self,
        client: &reqwest::Client,
        raw_tx_hex: &str,
        refund_address: &str,
    ) -> (bool, String) {
        let Some(url) = self.payment_url.as_deref().filter(|u| !u.is_empty()) else {
            return (false, NO_URL.to_string());
        };
        let payment = Payment {
            transactions: vec![raw_tx_hex],
            refund_to: vec![refund_address],
            memo: "Paid using centavo",
        };
        let response = match client
            .post(url)
            .header("Content-Type", "application/payment")
            .header("Accept", "application/payment-ack")
            .json(&payment)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return (false, e.to_string()),
        };
        let status = response.status();
        if !status.is_success() {
            // Propagate 400 bodies, they carry the merchant's reason; hide
            // other bodies which may be entire HTML documents.
            if status.as_u16() == 400 {
                let body = response.text().await.unwrap_or_default();
                return (false, format!("Bad request: {}", body));
            }
            return (
                false,
                status.canonical_reason().unwrap_or("request failed").to_string(),
            );
        }
        match response.json::<PaymentAck>().await {
            Ok(ack) => (true, ack.memo),
            Err(_) => (
                false,
                "PaymentACK could not be processed; the payment was sent, please verify it \
                 manually"
                    .to_string(),
            ),
        }
    }
}
