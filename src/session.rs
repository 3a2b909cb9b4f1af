//! The session manager: owns the wallet, contacts, invoices, config and the
//! send session, and hands out coherent snapshots to embedding hosts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use centavo_sdk::{ChainBackend, InvoiceList, Network};

use crate::alias::AliasResolver;
use crate::config::SendConfig;
use crate::contacts::Contacts;
use crate::send::{SendSession, SessionNotice, UserPrompts};
use crate::wallet::{WalletBalance, WalletManager, WalletStatus};

const INVOICES_FILE: &str = "invoices.json";

/// Serializable state snapshot for embedding frontends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub revision: u64,
    pub network: String,
    pub wallet_status: WalletStatus,
    pub balance: WalletBalance,
    pub unpaid_invoices: usize,
    pub last_sync: Option<String>,
}

pub struct SessionManager {
    data_dir: PathBuf,
    network: Network,
    config: SendConfig,
    wallet: WalletManager,
    contacts: Contacts,
    invoices: InvoiceList,
    send: SendSession,
    revision: u64,
}

impl SessionManager {
    pub fn new(
        data_dir: &Path,
        network: Network,
        backend: Arc<dyn ChainBackend>,
        prompts: Arc<dyn UserPrompts>,
        resolver: Option<Arc<dyn AliasResolver>>,
    ) -> Self {
        let network_dir = data_dir.join(network.as_str());
        let config = SendConfig::load(&network_dir);
        let wallet = WalletManager::new(data_dir, network, backend);
        let contacts = Contacts::load(&network_dir);
        let invoices = InvoiceList::load(network_dir.join(INVOICES_FILE));
        let send = SendSession::new(network, config.clone(), prompts, resolver);
        SessionManager {
            data_dir: data_dir.to_path_buf(),
            network,
            config,
            wallet,
            contacts,
            invoices,
            send,
            revision: 0,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn config(&self) -> &SendConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SendConfig) {
        self.config = config.clone();
        self.config.save(&self.data_dir.join(self.network.as_str()));
        self.send.set_config(config);
        self.bump_revision();
    }

    pub fn wallet(&self) -> &WalletManager {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut WalletManager {
        self.bump_revision();
        &mut self.wallet
    }

    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut Contacts {
        self.bump_revision();
        &mut self.contacts
    }

    pub fn invoices(&self) -> &InvoiceList {
        &self.invoices
    }

    pub fn send(&self) -> &SendSession {
        &self.send
    }

    /// Borrow the send session together with the collaborators its
    /// operations need.
    pub fn send_mut(
        &mut self,
    ) -> (
        &mut SendSession,
        &mut WalletManager,
        &mut Contacts,
        &mut InvoiceList,
    ) {
        self.revision += 1;
        (
            &mut self.send,
            &mut self.wallet,
            &mut self.contacts,
            &mut self.invoices,
        )
    }

    /// Drive the send session's timer once.
    pub fn tick(&mut self) -> Vec<SessionNotice> {
        let notices = self
            .send
            .tick(&mut self.wallet, &mut self.contacts, &mut self.invoices);
        if !notices.is_empty() {
            self.bump_revision();
        }
        notices
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            revision: self.revision,
            network: self.network.as_str().to_string(),
            wallet_status: self.wallet.status(),
            balance: self.wallet.balance(),
            unpaid_invoices: self.invoices.unpaid_count(),
            last_sync: self.wallet.last_sync().map(str::to_string),
        }
    }

    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }
}
