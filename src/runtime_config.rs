// =============================================================================
// Runtime Configuration — Lot sizes, strategy parameters, premium policy
// =============================================================================
//
// Loaded once at startup from JSON.  All fields carry `#[serde(default)]` so
// that adding new fields never breaks loading an older config file.  The lot
// size table is immutable for the lifetime of the process; it is maintained
// externally as exchange contract specifications change, so the service only
// ever reads the file.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_spread_offset() -> usize {
    2
}

fn default_condor_short_offset() -> usize {
    2
}

fn default_condor_wing_offset() -> usize {
    4
}

fn default_futures_stop_pct() -> f64 {
    2.0
}

fn default_futures_target_pct() -> f64 {
    5.0
}

fn default_missing_premium_placeholder() -> f64 {
    0.05
}

// =============================================================================
// LotSizeTable
// =============================================================================

/// Exchange lot size per underlying symbol.  Lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotSizeTable {
    sizes: HashMap<String, u32>,
}

impl LotSizeTable {
    pub fn new(sizes: HashMap<String, u32>) -> Self {
        let sizes = sizes
            .into_iter()
            .map(|(symbol, lot)| (symbol.trim().to_uppercase(), lot))
            .collect();
        Self { sizes }
    }

    /// Lot size for `symbol`, or 0 when the symbol is not in the table.
    /// Callers must treat 0 as "unresolved", not "no position".
    pub fn resolve(&self, symbol: &str) -> u32 {
        self.sizes
            .get(&symbol.trim().to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, u32> {
        &self.sizes
    }
}

impl Default for LotSizeTable {
    /// NSE F&O lot sizes for the most actively traded underlyings.
    fn default() -> Self {
        let sizes = [
            ("NIFTY", 75),
            ("BANKNIFTY", 35),
            ("FINNIFTY", 65),
            ("MIDCPNIFTY", 140),
            ("RELIANCE", 500),
            ("TCS", 175),
            ("INFY", 400),
            ("HDFCBANK", 550),
            ("ICICIBANK", 700),
            ("SBIN", 750),
            ("AXISBANK", 625),
            ("KOTAKBANK", 400),
            ("ITC", 1600),
            ("LT", 175),
            ("TATAMOTORS", 800),
        ]
        .into_iter()
        .map(|(symbol, lot)| (symbol.to_string(), lot))
        .collect();
        Self { sizes }
    }
}

// =============================================================================
// PremiumPolicy
// =============================================================================

/// How the synthesizer treats a leg whose premium is missing (<= 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PremiumPolicy {
    /// Substitute `missing_premium_placeholder` and carry on.
    #[default]
    Placeholder,
    /// Withhold the recommendation for that symbol.
    Strict,
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Tunable parameters for strategy construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Strikes between long and short legs of debit spreads.
    #[serde(default = "default_spread_offset")]
    pub spread_offset: usize,

    /// Strikes from ATM to the short legs of the iron condor.
    #[serde(default = "default_condor_short_offset")]
    pub condor_short_offset: usize,

    /// Strikes from ATM to the protective wings of the iron condor.
    #[serde(default = "default_condor_wing_offset")]
    pub condor_wing_offset: usize,

    /// Strikes beyond support/resistance for naked credit legs.
    #[serde(default)]
    pub credit_offset: usize,

    /// Stop distance for futures trades without option data (% of spot).
    #[serde(default = "default_futures_stop_pct")]
    pub futures_stop_pct: f64,

    /// Target distance for futures trades without option data (% of spot).
    #[serde(default = "default_futures_target_pct")]
    pub futures_target_pct: f64,

    #[serde(default)]
    pub premium_policy: PremiumPolicy,

    #[serde(default = "default_missing_premium_placeholder")]
    pub missing_premium_placeholder: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            spread_offset: default_spread_offset(),
            condor_short_offset: default_condor_short_offset(),
            condor_wing_offset: default_condor_wing_offset(),
            credit_offset: 0,
            futures_stop_pct: default_futures_stop_pct(),
            futures_target_pct: default_futures_target_pct(),
            premium_policy: PremiumPolicy::default(),
            missing_premium_placeholder: default_missing_premium_placeholder(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the scanner service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub lot_sizes: LotSizeTable,

    #[serde(default)]
    pub strategy_params: StrategyParams,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        // Normalise symbol keys.
        config.lot_sizes = LotSizeTable::new(config.lot_sizes.sizes);

        info!(
            path = %path.display(),
            lot_sizes = config.lot_sizes.len(),
            premium_policy = ?config.strategy_params.premium_policy,
            "runtime config loaded"
        );

        Ok(config)
    }

}
