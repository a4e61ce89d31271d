// =============================================================================
// Option Chain Analyzer — PCR, ATM IV proxy, max pain, OI walls
// =============================================================================
//
// Works on one symbol's snapshot.  Only the most liquid expiry (largest
// aggregate open interest, first-seen wins ties) is analysed:
//
//   PCR(OI)      = total put OI / total call OI       (0 when no call OI)
//   PCR(volume)  = total put vol / total call vol     (0 when no call vol)
//   ATM IV proxy = (ATM call + ATM put premium) / spot * 100
//   Max pain     = strike K minimising
//                    sum_{S<K} (K-S)*callOI(S) + sum_{S>K} (S-K)*putOI(S)
//   Support      = strike with the largest put OI
//   Resistance   = strike with the largest call OI
//
// Every scan runs over strikes in ascending order and replaces the incumbent
// only on a strict improvement, so ties resolve to the lower strike.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{OptionContract, OptionType};

// =============================================================================
// Strike ledger
// =============================================================================

/// Per-strike call/put open interest and premium for one expiry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeRow {
    pub strike: f64,
    pub call_oi: f64,
    pub put_oi: f64,
    pub call_premium: f64,
    pub put_premium: f64,
}

impl StrikeRow {
    fn empty(strike: f64) -> Self {
        Self {
            strike,
            call_oi: 0.0,
            put_oi: 0.0,
            call_premium: 0.0,
            put_premium: 0.0,
        }
    }

    pub fn premium(&self, option_type: OptionType) -> f64 {
        match option_type {
            OptionType::Call => self.call_premium,
            OptionType::Put => self.put_premium,
        }
    }
}

/// Distinct strikes kept in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrikeLedger {
    rows: Vec<StrikeRow>,
}

impl StrikeLedger {
    /// Build from contracts of a single expiry.  Repeated (strike, type)
    /// entries accumulate OI; the last premium seen is kept.
    pub fn from_contracts<'a, I>(contracts: I) -> Self
    where
        I: IntoIterator<Item = &'a OptionContract>,
    {
        let mut ledger = Self::default();
        for contract in contracts {
            let row = ledger.entry(contract.strike);
            match contract.option_type {
                OptionType::Call => {
                    row.call_oi += contract.open_interest;
                    row.call_premium = contract.premium;
                }
                OptionType::Put => {
                    row.put_oi += contract.open_interest;
                    row.put_premium = contract.premium;
                }
            }
        }
        ledger
    }

    fn entry(&mut self, strike: f64) -> &mut StrikeRow {
        let idx = match self.rows.binary_search_by(|r| r.strike.total_cmp(&strike)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.rows.insert(idx, StrikeRow::empty(strike));
                idx
            }
        };
        &mut self.rows[idx]
    }

    pub fn get(&self, strike: f64) -> Option<&StrikeRow> {
        self.rows
            .binary_search_by(|r| r.strike.total_cmp(&strike))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    pub fn strikes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.strike).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Aggregate option-writer payout if the underlying settles at `settle`.
    pub fn settlement_payout(&self, settle: f64) -> f64 {
        self.rows
            .iter()
            .map(|r| {
                if r.strike < settle {
                    (settle - r.strike) * r.call_oi
                } else if r.strike > settle {
                    (r.strike - settle) * r.put_oi
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Strike at which writers pay out the least.
    pub fn max_pain(&self) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for row in &self.rows {
            let payout = self.settlement_payout(row.strike);
            match best {
                Some((_, best_payout)) if payout >= best_payout => {}
                _ => best = Some((row.strike, payout)),
            }
        }
        best.map(|(strike, _)| strike)
    }

    /// Strike nearest `spot`.
    pub fn atm(&self, spot: f64) -> Option<&StrikeRow> {
        let mut best: Option<&StrikeRow> = None;
        for row in &self.rows {
            match best {
                Some(b) if (row.strike - spot).abs() >= (b.strike - spot).abs() => {}
                _ => best = Some(row),
            }
        }
        best
    }

    fn max_by_oi(&self, option_type: OptionType) -> Option<f64> {
        let oi = |r: &StrikeRow| match option_type {
            OptionType::Call => r.call_oi,
            OptionType::Put => r.put_oi,
        };
        let mut best: Option<&StrikeRow> = None;
        for row in &self.rows {
            match best {
                Some(b) if oi(row) <= oi(b) => {}
                _ => best = Some(row),
            }
        }
        best.map(|r| r.strike)
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Analytics for one symbol's most liquid expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainAnalysis {
    pub symbol: String,
    pub expiry: String,
    pub spot: f64,
    pub pcr_oi: f64,
    pub pcr_volume: f64,
    /// Straddle premium as a percentage of spot.
    pub atm_iv_proxy: f64,
    pub atm_strike: f64,
    pub max_pain: f64,
    pub support: f64,
    pub resistance: f64,
    pub total_call_oi: f64,
    pub total_put_oi: f64,
    pub ledger: StrikeLedger,
}

pub struct OptionChainAnalyzer;

impl OptionChainAnalyzer {
    /// Analyse all contracts of one symbol.  Returns `None` for an empty
    /// chain.
    pub fn analyze(symbol: &str, contracts: &[&OptionContract], spot: f64) -> Option<OptionChainAnalysis> {
        let expiry = Self::most_liquid_expiry(contracts)?;
        let selected: Vec<&OptionContract> = contracts
            .iter()
            .copied()
            .filter(|c| c.expiry == expiry)
            .collect();

        let ledger = StrikeLedger::from_contracts(selected.iter().copied());

        let (mut call_oi, mut put_oi, mut call_vol, mut put_vol) = (0.0, 0.0, 0.0, 0.0);
        for c in &selected {
            match c.option_type {
                OptionType::Call => {
                    call_oi += c.open_interest;
                    call_vol += c.volume;
                }
                OptionType::Put => {
                    put_oi += c.open_interest;
                    put_vol += c.volume;
                }
            }
        }

        let pcr_oi = ratio(put_oi, call_oi);
        let pcr_volume = ratio(put_vol, call_vol);

        let atm = ledger.atm(spot)?;
        let atm_strike = atm.strike;
        let atm_iv_proxy = if spot > 0.0 {
            (atm.call_premium + atm.put_premium) / spot * 100.0
        } else {
            0.0
        };

        let max_pain = ledger.max_pain()?;
        let support = ledger.max_by_oi(OptionType::Put)?;
        let resistance = ledger.max_by_oi(OptionType::Call)?;

        debug!(
            symbol,
            expiry = %expiry,
            strikes = ledger.len(),
            pcr_oi = format!("{:.3}", pcr_oi),
            max_pain,
            support,
            resistance,
            "option chain analysed"
        );

        Some(OptionChainAnalysis {
            symbol: symbol.to_string(),
            expiry,
            spot,
            pcr_oi,
            pcr_volume,
            atm_iv_proxy,
            atm_strike,
            max_pain,
            support,
            resistance,
            total_call_oi: call_oi,
            total_put_oi: put_oi,
            ledger,
        })
    }

    /// Expiry label with the largest aggregate OI; the first-seen label wins
    /// ties.
    pub fn most_liquid_expiry(contracts: &[&OptionContract]) -> Option<String> {
        let mut totals: Vec<(&str, f64)> = Vec::new();
        for c in contracts {
            match totals.iter_mut().find(|(label, _)| *label == c.expiry) {
                Some((_, total)) => *total += c.open_interest,
                None => totals.push((c.expiry.as_str(), c.open_interest)),
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for (label, total) in totals {
            match best {
                Some((_, best_total)) if total <= best_total => {}
                _ => best = Some((label, total)),
            }
        }
        best.map(|(label, _)| label.to_string())
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
