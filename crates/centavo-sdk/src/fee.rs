//! Fee-rate model: the slider level ladder, the custom-rate override, and
//! the per-transaction manual freeze, resolved in that (reversed) precedence
//! order: manual > custom rate > slider level.

/// Slider positions map onto this sat/kB ladder.
pub const FEE_LEVELS_SAT_PER_KB: [u64; 5] = [1000, 2000, 3000, 5000, 10_000];

/// Hard ceiling on the effective fee rate; building fails above it.
pub const MAX_FEE_RATE_SAT_PER_BYTE: u64 = 50;

/// How the fee for a transaction is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    /// Fixed total fee in satoshis (the user froze the fee field).
    Manual(u64),
    /// Config-level fixed rate in sat/kB.
    CustomRate(u64),
    /// Slider position into [`FEE_LEVELS_SAT_PER_KB`].
    Level(usize),
}

impl FeePolicy {
    /// Resolve the three fee sources with the send form's precedence.
    pub fn resolve(manual: Option<u64>, custom_rate: Option<u64>, level: usize) -> FeePolicy {
        if let Some(fee) = manual {
            FeePolicy::Manual(fee)
        } else if let Some(rate) = custom_rate {
            FeePolicy::CustomRate(rate)
        } else {
            FeePolicy::Level(level)
        }
    }

    /// The rate this policy implies, if it is rate-based.
    pub fn rate_sat_per_kb(&self) -> Option<u64> {
        match self {
            FeePolicy::Manual(_) => None,
            FeePolicy::CustomRate(rate) => Some(*rate),
            FeePolicy::Level(pos) => Some(level_to_rate(*pos)),
        }
    }

    /// Total fee for a transaction of the given size.
    pub fn fee_for_size(&self, size: usize) -> u64 {
        match self {
            FeePolicy::Manual(fee) => *fee,
            FeePolicy::CustomRate(rate) => estimate_fee(size, *rate),
            FeePolicy::Level(pos) => estimate_fee(size, level_to_rate(*pos)),
        }
    }
}

/// Slider position to sat/kB, clamped to the ladder.
pub fn level_to_rate(position: usize) -> u64 {
    let idx = position.min(FEE_LEVELS_SAT_PER_KB.len() - 1);
    FEE_LEVELS_SAT_PER_KB[idx]
}

/// Fee in satoshis for a size in bytes at a sat/kB rate, rounded up.
pub fn estimate_fee(size: usize, sat_per_kb: u64) -> u64 {
    (size as u64 * sat_per_kb).div_ceil(1000)
}

/// The fee slider widget's model: a position over the dynamic level ladder,
/// displaced entirely by a custom fixed rate when one is configured.
#[derive(Debug, Clone, Copy)]
pub struct FeeSlider {
    position: usize,
    custom_rate: Option<u64>,
}

impl FeeSlider {
    pub fn new(position: usize, custom_rate: Option<u64>) -> Self {
        FeeSlider {
            position: position.min(FEE_LEVELS_SAT_PER_KB.len() - 1),
            custom_rate,
        }
    }

    pub fn moved(&mut self, position: usize) {
        self.position = position.min(FEE_LEVELS_SAT_PER_KB.len() - 1);
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_custom_rate(&mut self, rate: Option<u64>) {
        self.custom_rate = rate;
    }

    pub fn fee_rate_sat_per_kb(&self) -> u64 {
        self.custom_rate
            .unwrap_or_else(|| level_to_rate(self.position))
    }
}
