//! Shared fixtures for unit and integration tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::address::Address;
use crate::chain::{ChainBackend, UnspentEntry};
use crate::error::{Error, Result};
use crate::signer::SoftwareSigner;
use crate::transaction::{Coin, OutPoint, Txid};

pub fn test_signer() -> SoftwareSigner {
    SoftwareSigner::from_seed(&[7u8; 64]).expect("fixture seed is valid")
}

pub fn test_address(tag: u8) -> Address {
    Address::p2pkh([tag; 20])
}

pub fn test_coin(tag: u8, value: u64, address: Address) -> Coin {
    Coin {
        outpoint: OutPoint::new(Txid::from_wire_bytes([tag; 32]), 0),
        value,
        address,
        height: Some(100),
        unremovable: false,
    }
}

/// In-memory chain backend: scripted UTXO sets, recorded broadcasts.
pub struct MockBackend {
    utxos: Mutex<HashMap<Vec<u8>, Vec<UnspentEntry>>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    fail_broadcast: AtomicBool,
}

impl Default for MockBackend {
    fn default() -> Self {
        MockBackend {
            utxos: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_broadcast: AtomicBool::new(false),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_utxo(&self, script: &[u8], entry: UnspentEntry) {
        self.utxos
            .lock()
            .unwrap()
            .entry(script.to_vec())
            .or_default()
            .push(entry);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_fail_broadcast(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }
}

impl ChainBackend for MockBackend {
    fn list_unspent(&self, script: &[u8]) -> Result<Vec<UnspentEntry>> {
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(script)
            .cloned()
            .unwrap_or_default())
    }

    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid> {
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(Error::Broadcast("mock broadcast failure".into()));
        }
        self.broadcasts.lock().unwrap().push(raw_tx.to_vec());
        Ok(Txid::from_wire_bytes(crate::transaction::double_sha256(
            raw_tx,
        )))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
