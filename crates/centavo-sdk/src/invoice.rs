//! Locally-authored invoices and the paid-status invoice list.
//!
//! An invoice is a JSON file a payee hands to a payer: an address, an amount
//! in some currency, and an exchange-rate policy (a fixed rate, or an HTTP
//! API to query at payment time). The invoice list mirrors the wallet's
//! "Invoices" pane: payment requests and loaded invoices keyed by id, with
//! paid-status tracking, persisted as a JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};

#[derive(Debug, Error)]
pub enum ExchangeRateApiError {
    #[error("exchange rate request failed: {0}")]
    Http(String),

    #[error("unexpected exchange rate response: {0}")]
    Shape(String),

    #[error("exchange rate is zero or negative")]
    BadRate,
}

/// How to turn the invoice currency into XEC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExchangeRate {
    /// Fixed units-per-XEC rate agreed at invoicing time.
    Fixed(f64),
    /// Rate fetched from a JSON API at payment time.
    Api(ExchangeRateApi),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateApi {
    pub url: String,
    /// Path of keys to walk in the JSON response to reach the rate.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub address: String,
    /// Amount in `currency` units.
    pub amount: f64,
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<ExchangeRate>,
    #[serde(default)]
    pub payee_address: String,
    #[serde(default)]
    pub payer_address: String,
}

impl Invoice {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|e| Error::Serialization(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// The amount in XEC, resolving the exchange-rate policy. An XEC
    /// invoice needs no rate; a fixed rate divides; an API rate is fetched
    /// at call time.
    pub async fn xec_amount(
        &self,
        client: &reqwest::Client,
    ) -> std::result::Result<f64, ExchangeRateApiError> {
        if self.currency.eq_ignore_ascii_case("xec") {
            return Ok(self.amount);
        }
        let rate = match &self.exchange_rate {
            None => return Ok(self.amount),
            Some(ExchangeRate::Fixed(rate)) => *rate,
            Some(ExchangeRate::Api(api)) => fetch_rate(client, api).await?,
        };
        if rate <= 0.0 {
            return Err(ExchangeRateApiError::BadRate);
        }
        Ok(self.amount / rate)
    }
}

async fn fetch_rate(
    client: &reqwest::Client,
    api: &ExchangeRateApi,
) -> std::result::Result<f64, ExchangeRateApiError> {
    let response = client
        .get(&api.url)
        .send()
        .await
        .map_err(|e| ExchangeRateApiError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ExchangeRateApiError::Http(format!(
            "status {}",
            response.status()
        )));
    }
    let mut value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ExchangeRateApiError::Shape(e.to_string()))?;
    for key in &api.keys {
        value = value
            .get_mut(key)
            .map(serde_json::Value::take)
            .ok_or_else(|| ExchangeRateApiError::Shape(format!("missing key {}", key)))?;
    }
    value
        .as_f64()
        .ok_or_else(|| ExchangeRateApiError::Shape("rate is not a number".into()))
}

// ── invoice list ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Expired,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceEntry {
    pub id: String,
    pub requestor: String,
    pub memo: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// The underlying payment request, kept so it can be re-paid from the
    /// invoice list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<crate::paymentrequest::PaymentRequest>,
}

impl InvoiceEntry {
    pub fn from_request(request: &crate::paymentrequest::PaymentRequest) -> Self {
        InvoiceEntry {
            id: request.id(),
            requestor: request.requestor(),
            memo: request.memo.clone(),
            amount: request.amount(),
            expires: request.expires,
            status: InvoiceStatus::Unpaid,
            txid: None,
            request: Some(request.clone()),
        }
    }
}

impl InvoiceEntry {
    /// Effective status, recomputing expiry against the clock.
    pub fn status_now(&self) -> InvoiceStatus {
        if self.status == InvoiceStatus::Paid {
            return InvoiceStatus::Paid;
        }
        match self.expires {
            Some(t) if t < chrono::Utc::now().timestamp() => InvoiceStatus::Expired,
            _ => InvoiceStatus::Unpaid,
        }
    }
}

/// JSON-persisted invoice list.
#[derive(Debug)]
pub struct InvoiceList {
    path: PathBuf,
    entries: HashMap<String, InvoiceEntry>,
}

impl InvoiceList {
    pub fn load(path: PathBuf) -> Self {
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        InvoiceList { path, entries }
    }

    pub fn add(&mut self, entry: InvoiceEntry) -> String {
        let key = entry.id.clone();
        self.entries.insert(key.clone(), entry);
        self.save();
        key
    }

    pub fn get(&self, key: &str) -> Option<&InvoiceEntry> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.save();
    }

    pub fn status(&self, key: &str) -> Option<InvoiceStatus> {
        self.entries.get(key).map(|e| e.status_now())
    }

    pub fn set_paid(&mut self, key: &str, txid: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.status = InvoiceStatus::Paid;
            entry.txid = Some(txid.to_string());
            self.save();
        }
    }

    pub fn unpaid_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status_now() == InvoiceStatus::Unpaid)
            .count()
    }

    pub fn entries(&self) -> impl Iterator<Item = &InvoiceEntry> {
        self.entries.values()
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&self.entries) {
            let _ = fs::write(&self.path, json);
        }
    }
}
