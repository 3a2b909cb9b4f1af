//! Backend for interacting with the eCash chain over the electrum protocol.

use electrum_client::ElectrumApi;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::transaction::{OutPoint, Txid};

/// A single unspent output of a watched script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentEntry {
    pub outpoint: OutPoint,
    pub value: u64,
    /// Block height. 0 or negative means unconfirmed (mempool).
    pub height: i32,
}

pub trait ChainBackend: Send + Sync {
    /// Scan a locking script for unspent outputs.
    fn list_unspent(&self, script: &[u8]) -> Result<Vec<UnspentEntry>>;

    /// Broadcast a signed raw transaction and return its txid.
    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid>;

    /// Cheap liveness check used to refuse hopeless broadcasts early.
    fn is_connected(&self) -> bool;
}

/// Electrum-based chain backend.
pub struct ElectrumBackend {
    electrum_url: String,
}

impl ElectrumBackend {
    pub fn new(electrum_url: &str) -> Self {
        Self {
            electrum_url: electrum_url.to_string(),
        }
    }

    pub fn electrum_url(&self) -> &str {
        &self.electrum_url
    }

    fn client(&self) -> Result<electrum_client::Client> {
        electrum_client::Client::new(&self.electrum_url)
            .map_err(|e| Error::Electrum(e.to_string()))
    }

    /// Electrum script hash = SHA256(scriptPubKey) with reversed byte order.
    fn script_hash_hex(script: &[u8]) -> String {
        let mut hash = Sha256::digest(script).to_vec();
        hash.reverse();
        hex::encode(hash)
    }
}

impl ChainBackend for ElectrumBackend {
    fn list_unspent(&self, script: &[u8]) -> Result<Vec<UnspentEntry>> {
        let client = self.client()?;
        let resp = client
            .raw_call(
                "blockchain.scripthash.listunspent",
                [electrum_client::Param::String(Self::script_hash_hex(script))],
            )
            .map_err(|e| Error::Electrum(e.to_string()))?;

        let entries = resp
            .as_array()
            .ok_or_else(|| Error::Electrum("expected array response".into()))?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let tx_hash = entry["tx_hash"]
                .as_str()
                .ok_or_else(|| Error::Electrum("missing tx_hash".into()))?;
            let tx_pos = entry["tx_pos"]
                .as_u64()
                .ok_or_else(|| Error::Electrum("missing tx_pos".into()))? as u32;
            let value = entry["value"]
                .as_u64()
                .ok_or_else(|| Error::Electrum("missing value".into()))?;
            let height = entry["height"].as_i64().unwrap_or(0) as i32;

            results.push(UnspentEntry {
                outpoint: OutPoint::new(Txid::from_hex(tx_hash)?, tx_pos),
                value,
                height,
            });
        }
        Ok(results)
    }

    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid> {
        log::info!(
            "broadcasting {} byte transaction via {}",
            raw_tx.len(),
            self.electrum_url
        );
        let client = self.client()?;
        let resp = client
            .raw_call(
                "blockchain.transaction.broadcast",
                [electrum_client::Param::String(hex::encode(raw_tx))],
            )
            .map_err(|e| Error::Broadcast(e.to_string()))?;
        let txid_hex = resp
            .as_str()
            .ok_or_else(|| Error::Broadcast("expected txid string".into()))?;
        Txid::from_hex(txid_hex)
    }

    fn is_connected(&self) -> bool {
        self.client().map(|c| c.ping().is_ok()).unwrap_or(false)
    }
}
