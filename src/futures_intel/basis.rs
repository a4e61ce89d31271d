// =============================================================================
// Basis Divergence Detector — Futures premium / discount to spot
// =============================================================================
//
//   basis% = (futures_close - spot) / spot * 100
//
//   basis >  0.5  => PREMIUM
//   basis < -0.5  => DISCOUNT
//   otherwise     => NEUTRAL   (boundaries are exclusive)
//
// Spot comes from the first option contract per symbol carrying a positive
// underlying value; the snapshot is a single trading day so only one spot
// exists per symbol.  The futures price is the last record seen for the
// symbol in input order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{FuturesDailyRecord, OptionContract};

/// Basis magnitude (percent) beyond which a reading is classified.
const BASIS_THRESHOLD_PCT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DivergenceClass {
    Premium,
    Discount,
    Neutral,
}

impl DivergenceClass {
    pub fn from_basis(basis_pct: f64) -> Self {
        if basis_pct > BASIS_THRESHOLD_PCT {
            Self::Premium
        } else if basis_pct < -BASIS_THRESHOLD_PCT {
            Self::Discount
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for DivergenceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Premium => write!(f, "PREMIUM"),
            Self::Discount => write!(f, "DISCOUNT"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceSignal {
    pub symbol: String,
    pub futures_price: f64,
    pub spot_price: f64,
    pub basis_pct: f64,
    pub classification: DivergenceClass,
}

/// Spot price per symbol: first contract with a positive underlying wins.
pub fn spot_prices(options: &[OptionContract]) -> HashMap<&str, f64> {
    let mut spots: HashMap<&str, f64> = HashMap::new();
    for contract in options {
        if contract.underlying > 0.0 && contract.underlying.is_finite() {
            spots.entry(contract.symbol.as_str()).or_insert(contract.underlying);
        }
    }
    spots
}

pub struct BasisDetector;

impl BasisDetector {
    /// Compute basis for every symbol present in both inputs, sorted by basis
    /// descending.  Symbols first seen earlier in the futures input come first
    /// among equal basis readings.
    pub fn detect(futures: &[FuturesDailyRecord], options: &[OptionContract]) -> Vec<DivergenceSignal> {
        let spots = spot_prices(options);

        // Latest close per symbol, keyed by first-appearance index.
        let mut order: Vec<&str> = Vec::new();
        let mut latest: HashMap<&str, f64> = HashMap::new();
        for record in futures {
            let symbol = record.symbol.as_str();
            if latest.insert(symbol, record.close).is_none() {
                order.push(symbol);
            }
        }

        let mut out: Vec<DivergenceSignal> = order
            .into_iter()
            .filter_map(|symbol| {
                let spot = *spots.get(symbol)?;
                let futures_price = latest[symbol];
                Some(Self::measure(symbol, futures_price, spot))
            })
            .collect();

        out.sort_by(|a, b| b.basis_pct.total_cmp(&a.basis_pct));
        out
    }

    /// Basis reading for one futures/spot pair.  `spot` must be positive.
    pub fn measure(symbol: &str, futures_price: f64, spot: f64) -> DivergenceSignal {
        let basis_pct = (futures_price - spot) * 100.0 / spot;
        let classification = DivergenceClass::from_basis(basis_pct);

        debug!(
            symbol,
            futures_price,
            spot,
            basis_pct = format!("{:.3}", basis_pct),
            classification = %classification,
            "basis measured"
        );

        DivergenceSignal {
            symbol: symbol.to_string(),
            futures_price,
            spot_price: spot,
            basis_pct,
            classification,
        }
    }
}
