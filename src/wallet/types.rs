use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    NotCreated,
    Locked,
    Unlocked,
}

/// Balance split the send form cares about: frozen funds are excluded from
/// spendable coins but surfaced in the "not enough funds" status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub frozen: u64,
}

impl WalletBalance {
    pub fn spendable(&self) -> u64 {
        self.confirmed + self.unconfirmed
    }

    pub fn total(&self) -> u64 {
        self.confirmed + self.unconfirmed + self.frozen
    }
}
