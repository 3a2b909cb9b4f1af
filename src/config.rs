//! Send-form configuration, persisted as JSON next to the wallet data.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use centavo_sdk::FeePolicy;

const CONFIG_FILE: &str = "send_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendConfig {
    /// Decimal places of the display unit; 2 = XEC.
    pub decimal_point: u8,
    /// Fee slider position into the dynamic level ladder.
    pub fee_level: usize,
    /// Config-level fixed rate in sat/kB; hides the slider when set.
    pub custom_fee_rate: Option<u64>,
    /// Whether the OP_RETURN fields participate in the send form.
    pub enable_opreturn: bool,
    pub warn_legacy_address: bool,
    pub allow_legacy_p2sh: bool,
}

impl Default for SendConfig {
    fn default() -> Self {
        SendConfig {
            decimal_point: 2,
            fee_level: 0,
            custom_fee_rate: None,
            enable_opreturn: false,
            warn_legacy_address: true,
            allow_legacy_p2sh: false,
        }
    }
}

impl SendConfig {
    pub fn load(dir: &Path) -> Self {
        fs::read_to_string(dir.join(CONFIG_FILE))
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, dir: &Path) {
        let path = dir.join(CONFIG_FILE);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }

    pub fn has_custom_fee_rate(&self) -> bool {
        self.custom_fee_rate.is_some()
    }

    /// Resolve the active fee policy: a manually frozen fee wins over the
    /// custom rate, which wins over the slider level.
    pub fn fee_policy(&self, manual_fee: Option<u64>) -> FeePolicy {
        FeePolicy::resolve(manual_fee, self.custom_fee_rate, self.fee_level)
    }
}
