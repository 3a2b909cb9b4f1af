//! Alias resolution: turning a domain-like name in the recipient field into
//! an address via an alias server.
//!
//! Lookups are kicked off from the session's timer tick (never per
//! keystroke) on a blocking worker task, and the outcome re-enters the
//! session through its event channel. Failures are silent: the field is
//! simply left as free text.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    pub name: String,
    pub address: String,
    /// Whether the record passed the server's cryptographic validation
    /// (DNSSEC for OpenAlias); unvalidated records require an extra user
    /// confirmation before sending.
    pub validated: bool,
    /// OpenAlias records must not be persisted to contacts, their
    /// destination address is not permanent.
    pub openalias: bool,
}

/// A blocking name-to-address resolver with an internal timeout.
pub trait AliasResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<AliasRecord>;
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    address: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    openalias: bool,
}

/// Resolver backed by an alias-server HTTP API.
pub struct HttpAliasResolver {
    server_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAliasResolver {
    /// The lookup is bounded to ~5 seconds; a slow server degrades to a
    /// failed resolution rather than a hung tick.
    pub const TIMEOUT_SECS: u64 = 5;

    pub fn new(server_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(Self::TIMEOUT_SECS))
            .build()
            .expect("reqwest client with static configuration");
        HttpAliasResolver {
            server_url: server_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

impl AliasResolver for HttpAliasResolver {
    fn resolve(&self, name: &str) -> Option<AliasRecord> {
        let url = format!("{}/alias/{}", self.server_url, name);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(e) => {
                log::debug!("alias lookup for {} failed: {}", name, e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::debug!("alias lookup for {}: status {}", name, response.status());
            return None;
        }
        let body: AliasResponse = match response.json() {
            Ok(b) => b,
            Err(e) => {
                log::debug!("alias lookup for {}: bad response: {}", name, e);
                return None;
            }
        };
        Some(AliasRecord {
            name: name.to_string(),
            address: body.address,
            validated: body.verified,
            openalias: body.openalias,
        })
    }
}

