//! The wallet: keystore lifecycle, derived addresses, the synced UTXO set,
//! and the engine calls the send form builds against.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use centavo_sdk::{
    Address, ChainBackend, Coin, FeePolicy, KeyBranch, Network, Output, SoftwareSigner,
    Transaction, make_unsigned_transaction, parse_address,
};

use super::persister::{KeystoreError, KeystorePersister};
use super::types::{WalletBalance, WalletStatus};

const STATE_FILE: &str = "wallet_state.json";
const RECEIVING_COUNT: u32 = 20;
const CHANGE_COUNT: u32 = 6;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet already exists for this network")]
    AlreadyExists,

    #[error("Invalid mnemonic")]
    InvalidMnemonic,

    #[error("Wallet not unlocked")]
    NotUnlocked,

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Persist error: {0}")]
    Persist(#[from] KeystoreError),
}

/// Labels and frozen addresses survive restarts; the UTXO set is re-synced.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WalletStateFile {
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    frozen_addresses: Vec<String>,
}

pub struct WalletManager {
    data_dir: PathBuf,
    network: Network,
    persister: KeystorePersister,
    backend: Arc<dyn ChainBackend>,
    signer: Option<SoftwareSigner>,
    receiving_addresses: Vec<Address>,
    change_addresses: Vec<Address>,
    utxos: Vec<Coin>,
    frozen_addresses: HashSet<Address>,
    labels: HashMap<String, String>,
    last_sync: Option<String>,
}

impl WalletManager {
    pub fn new(data_dir: &Path, network: Network, backend: Arc<dyn ChainBackend>) -> Self {
        let persister = KeystorePersister::new(data_dir, network.as_str());
        let mut manager = WalletManager {
            data_dir: data_dir.to_path_buf(),
            network,
            persister,
            backend,
            signer: None,
            receiving_addresses: Vec::new(),
            change_addresses: Vec::new(),
            utxos: Vec::new(),
            frozen_addresses: HashSet::new(),
            labels: HashMap::new(),
            last_sync: None,
        };
        manager.load_state();
        manager
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn status(&self) -> WalletStatus {
        if !self.persister.exists() {
            WalletStatus::NotCreated
        } else if self.signer.is_none() {
            WalletStatus::Locked
        } else {
            WalletStatus::Unlocked
        }
    }

    // ── keystore lifecycle ──────────────────────────────────────────────

    /// Create a new wallet with a random mnemonic, encrypt with password.
    /// Returns the mnemonic string for user backup.
    pub fn create_wallet(&mut self, password: &str) -> Result<String, WalletError> {
        if self.persister.exists() {
            return Err(WalletError::AlreadyExists);
        }
        let entropy: [u8; 16] = rand::random();
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
            .map_err(|e| WalletError::Signer(e.to_string()))?;
        let mnemonic_str = mnemonic.to_string();
        self.persister.save(&mnemonic_str, password)?;
        self.init_from_mnemonic(&mnemonic_str)?;
        Ok(mnemonic_str)
    }

    /// Restore a wallet from an existing mnemonic, encrypt with password.
    pub fn restore_wallet(&mut self, mnemonic: &str, password: &str) -> Result<(), WalletError> {
        let _parsed: bip39::Mnemonic =
            mnemonic.parse().map_err(|_| WalletError::InvalidMnemonic)?;
        self.persister.save(mnemonic, password)?;
        self.init_from_mnemonic(mnemonic)
    }

    pub fn unlock(&mut self, password: &str) -> Result<(), WalletError> {
        let mut mnemonic = self.persister.load(password)?;
        let result = self.init_from_mnemonic(&mnemonic);
        mnemonic.zeroize();
        result
    }

    /// Clear key material from memory. Derived addresses stay for
    /// watch-only display.
    pub fn lock(&mut self) {
        self.signer = None;
    }

    pub fn delete_wallet(&mut self) -> Result<(), WalletError> {
        self.persister.delete()?;
        self.signer = None;
        self.receiving_addresses.clear();
        self.change_addresses.clear();
        self.utxos.clear();
        Ok(())
    }

    /// Re-read the mnemonic for backup display; requires the password.
    pub fn export_mnemonic(&self, password: &str) -> Result<String, WalletError> {
        Ok(self.persister.load(password)?)
    }

    fn init_from_mnemonic(&mut self, mnemonic_str: &str) -> Result<(), WalletError> {
        let mnemonic: bip39::Mnemonic = mnemonic_str
            .parse()
            .map_err(|_| WalletError::InvalidMnemonic)?;
        let mut seed = mnemonic.to_seed("");
        let signer_result = SoftwareSigner::from_seed(&seed);
        seed.zeroize();
        let mut signer = signer_result.map_err(|e| WalletError::Signer(e.to_string()))?;

        let mut receiving = Vec::with_capacity(RECEIVING_COUNT as usize);
        for i in 0..RECEIVING_COUNT {
            receiving.push(
                signer
                    .derive(KeyBranch::Receiving, i)
                    .map_err(|e| WalletError::Signer(e.to_string()))?,
            );
        }
        let mut change = Vec::with_capacity(CHANGE_COUNT as usize);
        for i in 0..CHANGE_COUNT {
            change.push(
                signer
                    .derive(KeyBranch::Change, i)
                    .map_err(|e| WalletError::Signer(e.to_string()))?,
            );
        }

        self.receiving_addresses = receiving;
        self.change_addresses = change;
        self.signer = Some(signer);
        Ok(())
    }

    // ── addresses ───────────────────────────────────────────────────────

    pub fn receiving_address(&self, index: usize) -> Option<Address> {
        self.receiving_addresses.get(index).copied()
    }

    pub fn receiving_addresses(&self) -> &[Address] {
        &self.receiving_addresses
    }

    /// Placeholder payee used for fee preview before a recipient is typed.
    pub fn dummy_address(&self) -> Address {
        self.receiving_addresses
            .first()
            .copied()
            .unwrap_or_else(|| Address::p2pkh([0u8; 20]))
    }

    /// Refund address handed to payment-request ACKs.
    pub fn refund_address(&self) -> Option<Address> {
        self.receiving_addresses.first().copied()
    }

    // ── UTXO set ────────────────────────────────────────────────────────

    /// Re-scan all derived addresses against the chain backend.
    pub fn sync(&mut self) -> Result<(), WalletError> {
        let mut utxos = Vec::new();
        for address in self
            .receiving_addresses
            .iter()
            .chain(self.change_addresses.iter())
        {
            let entries = self
                .backend
                .list_unspent(&address.to_script())
                .map_err(|e| WalletError::Sync(e.to_string()))?;
            for entry in entries {
                utxos.push(Coin {
                    outpoint: entry.outpoint,
                    value: entry.value,
                    address: *address,
                    height: (entry.height > 0).then_some(entry.height as u32),
                    unremovable: false,
                });
            }
        }
        self.utxos = utxos;
        self.last_sync = Some(chrono::Utc::now().to_rfc3339());
        log::debug!("synced {} utxos", self.utxos.len());
        Ok(())
    }

    pub fn last_sync(&self) -> Option<&str> {
        self.last_sync.as_deref()
    }

    /// Coins the send form may spend. `domain` restricts to specific
    /// addresses; paying an invoice restricts to confirmed coins.
    pub fn get_spendable_coins(&self, domain: Option<&[Address]>, is_invoice: bool) -> Vec<Coin> {
        self.utxos
            .iter()
            .filter(|c| !self.frozen_addresses.contains(&c.address))
            .filter(|c| domain.map_or(true, |d| d.contains(&c.address)))
            .filter(|c| !is_invoice || c.height.is_some())
            .cloned()
            .collect()
    }

    pub fn balance(&self) -> WalletBalance {
        let mut balance = WalletBalance::default();
        for coin in &self.utxos {
            if self.frozen_addresses.contains(&coin.address) {
                balance.frozen += coin.value;
            } else if coin.height.is_some() {
                balance.confirmed += coin.value;
            } else {
                balance.unconfirmed += coin.value;
            }
        }
        balance
    }

    pub fn frozen_balance(&self) -> u64 {
        self.balance().frozen
    }

    pub fn set_frozen(&mut self, address: Address, frozen: bool) {
        if frozen {
            self.frozen_addresses.insert(address);
        } else {
            self.frozen_addresses.remove(&address);
        }
        self.save_state();
    }

    pub fn is_frozen(&self, address: &Address) -> bool {
        self.frozen_addresses.contains(address)
    }

    // ── engine calls ────────────────────────────────────────────────────

    /// Build an unsigned transaction against the wallet's change addresses.
    /// Errors pass through untyped so the fee loop can match the named
    /// build failures.
    pub fn make_unsigned_transaction(
        &self,
        coins: &[Coin],
        outputs: &[Output],
        fee_policy: FeePolicy,
        shuffle_outputs: bool,
    ) -> centavo_sdk::Result<Transaction> {
        let change = if self.change_addresses.is_empty() {
            &self.receiving_addresses
        } else {
            &self.change_addresses
        };
        make_unsigned_transaction(coins, outputs, fee_policy, change, shuffle_outputs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<usize, WalletError> {
        let signer = self.signer.as_ref().ok_or(WalletError::NotUnlocked)?;
        signer
            .sign_transaction(tx)
            .map_err(|e| WalletError::Signer(e.to_string()))
    }

    /// Clone of the signing state for a background signing task.
    pub fn signer_handle(&self) -> Result<SoftwareSigner, WalletError> {
        self.signer.clone().ok_or(WalletError::NotUnlocked)
    }

    pub fn backend(&self) -> Arc<dyn ChainBackend> {
        Arc::clone(&self.backend)
    }

    // ── labels ──────────────────────────────────────────────────────────

    pub fn set_label(&mut self, txid: &str, label: &str) {
        if label.is_empty() {
            self.labels.remove(txid);
        } else {
            self.labels.insert(txid.to_string(), label.to_string());
        }
        self.save_state();
    }

    pub fn label(&self, txid: &str) -> Option<&str> {
        self.labels.get(txid).map(String::as_str)
    }

    // ── state persistence ───────────────────────────────────────────────

    fn state_path(&self) -> PathBuf {
        self.data_dir.join(self.network.as_str()).join(STATE_FILE)
    }

    fn load_state(&mut self) {
        let Some(state) = fs::read_to_string(self.state_path())
            .ok()
            .and_then(|contents| serde_json::from_str::<WalletStateFile>(&contents).ok())
        else {
            return;
        };
        self.labels = state.labels;
        self.frozen_addresses = state
            .frozen_addresses
            .iter()
            .filter_map(|s| parse_address(s, self.network).ok())
            .map(|p| p.address)
            .collect();
    }

    fn save_state(&self) {
        let state = WalletStateFile {
            labels: self.labels.clone(),
            frozen_addresses: self
                .frozen_addresses
                .iter()
                .map(|a| a.to_cashaddr(self.network))
                .collect(),
        };
        let path = self.state_path();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&state) {
            let _ = fs::write(path, json);
        }
    }
}
