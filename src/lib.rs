//! Centavo: a headless eCash send-payment engine.
//!
//! The send workflow of a desktop wallet — recipient parsing, fee
//! negotiation, OP_RETURN policy, payment requests, signing and broadcast —
//! with the presentation layer replaced by an explicit session object and
//! an event channel. Hosts embed [`SessionManager`], drive
//! [`SessionManager::tick`] from their event loop, and render the snapshots
//! and notices it returns.

pub mod alias;
pub mod config;
pub mod contacts;
pub mod send;
pub mod session;
pub mod wallet;

pub use centavo_sdk as sdk;
pub use centavo_sdk::Network;

pub use alias::{AliasRecord, AliasResolver, HttpAliasResolver};
pub use config::SendConfig;
pub use contacts::{ContactKind, Contacts};
pub use send::{
    FeeUpdateOutcome, SendAttempt, SendError, SendSession, SessionEvent, SessionNotice,
    UserPrompts,
};
pub use session::{SessionManager, SessionState};
pub use wallet::{WalletBalance, WalletManager, WalletStatus};

/// Install the rustls CryptoProvider before any TLS connections.
/// electrum-client pulls in rustls 0.23 which requires an explicit provider.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
