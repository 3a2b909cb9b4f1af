use serde::{Deserialize, Serialize};

/// Network variants for eCash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Cashaddr prefix, doubling as the BIP21 URI scheme.
    pub fn cashaddr_prefix(self) -> &'static str {
        match self {
            Network::Mainnet => "ecash",
            Network::Testnet => "ectest",
            Network::Regtest => "ecregtest",
        }
    }

    pub fn uri_scheme(self) -> &'static str {
        self.cashaddr_prefix()
    }

    pub fn default_electrum_url(self) -> &'static str {
        match self {
            Network::Mainnet => "ssl://electrum.bitcoinabc.org:50002",
            Network::Testnet => "ssl://telectrum.bitcoinabc.org:60002",
            Network::Regtest => "tcp://localhost:50001",
        }
    }

    pub fn default_alias_server(self) -> &'static str {
        match self {
            Network::Mainnet => "https://alias.etokens.cash",
            Network::Testnet => "https://aliastest.etokens.cash",
            Network::Regtest => "http://localhost:5000",
        }
    }

    /// Legacy base58check version byte for P2PKH addresses.
    pub fn legacy_p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet | Network::Regtest => 0x6f,
        }
    }

    /// Legacy base58check version byte for P2SH addresses.
    pub fn legacy_p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet | Network::Regtest => 0xc4,
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "ecash" => Ok(Network::Mainnet),
            "testnet" | "ectest" => Ok(Network::Testnet),
            "regtest" | "ecregtest" => Ok(Network::Regtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}
