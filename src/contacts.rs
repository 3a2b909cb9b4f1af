//! The contacts store: names resolvable in the send form's recipient field.
//!
//! Resolved eCash aliases are added here so the next payment autocompletes;
//! OpenAlias results are deliberately never persisted, since their
//! destination address may be rotated by the domain owner at any time.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use centavo_sdk::{Address, Network, parse_address};

use crate::alias::AliasRecord;

const CONTACTS_FILE: &str = "contacts.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Address,
    Alias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactEntry {
    pub address: String,
    pub kind: ContactKind,
}

#[derive(Debug)]
pub struct Contacts {
    path: PathBuf,
    entries: HashMap<String, ContactEntry>,
}

impl Contacts {
    pub fn load(dir: &std::path::Path) -> Self {
        let path = dir.join(CONTACTS_FILE);
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        Contacts { path, entries }
    }

    pub fn insert(&mut self, name: &str, address: &str, kind: ContactKind) {
        self.entries.insert(
            name.to_string(),
            ContactEntry {
                address: address.to_string(),
                kind,
            },
        );
        self.save();
    }

    /// Record a resolved alias. OpenAlias records are skipped entirely.
    pub fn add_alias(&mut self, record: &AliasRecord) {
        if record.openalias {
            return;
        }
        self.insert(&record.name, &record.address, ContactKind::Alias);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
        self.save();
    }

    pub fn get(&self, name: &str) -> Option<&ContactEntry> {
        self.entries.get(name)
    }

    /// Resolve a contact name to an address for the payto parser.
    pub fn resolve(&self, name: &str, network: Network) -> Option<Address> {
        let entry = self.entries.get(name)?;
        parse_address(&entry.address, network).ok().map(|p| p.address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, openalias: bool) -> AliasRecord {
        AliasRecord {
            name: name.to_string(),
            address: Address::p2pkh([3; 20]).to_cashaddr(Network::Mainnet),
            validated: true,
            openalias,
        }
    }

    #[test]
    fn insert_resolve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = Contacts::load(dir.path());
        let addr = Address::p2pkh([1; 20]);
        contacts.insert(
            "alice",
            &addr.to_cashaddr(Network::Mainnet),
            ContactKind::Address,
        );
        assert_eq!(contacts.resolve("alice", Network::Mainnet), Some(addr));
        assert_eq!(contacts.resolve("bob", Network::Mainnet), None);

        let reloaded = Contacts::load(dir.path());
        assert_eq!(reloaded.resolve("alice", Network::Mainnet), Some(addr));
    }

    #[test]
    fn ecash_alias_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = Contacts::load(dir.path());
        contacts.add_alias(&record("pay.example", false));
        assert_eq!(contacts.len(), 1);
        assert_eq!(Contacts::load(dir.path()).len(), 1);
    }

    #[test]
    fn openalias_is_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = Contacts::load(dir.path());
        contacts.add_alias(&record("satoshi@domain.com", true));
        assert!(contacts.is_empty());
    }
}
