// =============================================================================
// Scan Pipeline — Sanitise, group, and run the five analysis stages
// =============================================================================
//
//   futures records ──► OI classifier ──────────────┐
//                                                   ├─► conviction ─► synthesizer
//   option contracts ─► chain analyzer (per symbol) ┤
//                     └► basis detector ────────────┘
//
// Pure and synchronous: identical inputs always yield identical outputs.  The
// "current day" is the last record of each symbol's history, never the wall
// clock.  Every degradation becomes a diagnostic instead of an error.
// =============================================================================

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::futures_intel::basis::spot_prices;
use crate::futures_intel::{BasisDetector, ClassifiedSignal, DivergenceSignal, OpenInterestClassifier};
use crate::options::{OptionChainAnalysis, OptionChainAnalyzer};
use crate::runtime_config::RuntimeConfig;
use crate::signals::ConvictionScorer;
use crate::strategy::{StrategyRecommendation, StrategySynthesizer, SymbolContext};
use crate::types::{FuturesDailyRecord, OptionContract};

/// Input batch handed over by the ingestion collaborator.  Records stay raw
/// until `run_scan` decodes them one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanInput {
    #[serde(default)]
    pub futures: Vec<Value>,
    #[serde(default)]
    pub options: Vec<Value>,
}

/// Everything one scan produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Sorted by OI change % descending.
    pub signals: Vec<ClassifiedSignal>,
    /// One per option symbol, in first-appearance order.
    pub option_chains: Vec<OptionChainAnalysis>,
    /// Sorted by basis descending.
    pub divergences: Vec<DivergenceSignal>,
    /// Same order as `signals`, minus withheld symbols.
    pub recommendations: Vec<StrategyRecommendation>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    pub fn recommendation(&self, symbol: &str) -> Option<&StrategyRecommendation> {
        let symbol = normalise_symbol(symbol);
        self.recommendations.iter().find(|r| r.symbol == symbol)
    }

    pub fn option_chain(&self, symbol: &str) -> Option<&OptionChainAnalysis> {
        let symbol = normalise_symbol(symbol);
        self.option_chains.iter().find(|a| a.symbol == symbol)
    }
}

pub fn normalise_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Decode a raw batch and scan it.  Records that do not decode are skipped
/// with an `INVALID_RECORD` diagnostic; the rest of the batch still runs.
pub fn run_scan(input: &ScanInput, config: &RuntimeConfig) -> PipelineOutput {
    let mut diagnostics = Diagnostics::new();
    let futures: Vec<FuturesDailyRecord> =
        decode_records(&input.futures, "futures record", &mut diagnostics);
    let options: Vec<OptionContract> =
        decode_records(&input.options, "option contract", &mut diagnostics);

    let mut output = run_pipeline(&futures, &options, config);
    diagnostics.extend(std::mem::take(&mut output.diagnostics));
    output.diagnostics = diagnostics;
    output
}

/// Run a full scan over one batch of decoded records.
pub fn run_pipeline(
    futures: &[FuturesDailyRecord],
    options: &[OptionContract],
    config: &RuntimeConfig,
) -> PipelineOutput {
    let mut diagnostics = Diagnostics::new();
    // ── 1. Sanitise ──────────────────────────────────────────────────────
    let futures = sanitise_futures(futures, &mut diagnostics);
    let options = sanitise_options(options, &mut diagnostics);

    // ── 2. Group futures by symbol, first-appearance order ──────────────
    let groups = group_by_symbol(&futures, |r| r.symbol.as_str());
    for (symbol, history) in &groups {
        if history.len() < 2 {
            diagnostics.push(Diagnostic::for_symbol(
                DiagnosticKind::InsufficientHistory,
                symbol,
                format!("{} session(s) of futures history; at least 2 required", history.len()),
            ));
        }
        if history.windows(2).any(|w| w[1].date <= w[0].date) {
            diagnostics.push(Diagnostic::for_symbol(
                DiagnosticKind::NonChronological,
                symbol,
                "futures dates are not strictly ascending; input order used as given",
            ));
        }
    }

    // ── 3. Classify ──────────────────────────────────────────────────────
    let signals = OpenInterestClassifier::classify_all(
        groups
            .iter()
            .map(|(symbol, history)| (*symbol, history.as_slice())),
    );

    // ── 4. Option chains ─────────────────────────────────────────────────
    let spots = spot_prices(&options);
    let last_close: HashMap<&str, f64> = groups
        .iter()
        .filter_map(|(symbol, history)| history.last().map(|r| (*symbol, r.close)))
        .collect();

    let option_chains: Vec<OptionChainAnalysis> = group_by_symbol(&options, |c| c.symbol.as_str())
        .into_iter()
        .filter_map(|(symbol, contracts)| {
            let spot = spots
                .get(symbol)
                .or_else(|| last_close.get(symbol))
                .copied()
                .unwrap_or(0.0);
            OptionChainAnalyzer::analyze(symbol, &contracts, spot)
        })
        .collect();

    // ── 5. Basis ─────────────────────────────────────────────────────────
    let divergences = BasisDetector::detect(&futures, &options);

    // ── 6. Score and synthesise ──────────────────────────────────────────
    let synthesizer = StrategySynthesizer::new(&config.lot_sizes, &config.strategy_params);
    let mut recommendations = Vec::with_capacity(signals.len());

    for signal in &signals {
        let symbol = signal.symbol.as_str();
        let analysis = option_chains.iter().find(|a| a.symbol == symbol);
        let divergence = divergences.iter().find(|d| d.symbol == symbol);

        let ctx = SymbolContext {
            signal,
            analysis,
            divergence,
        };
        let conviction = ConvictionScorer::score(signal, analysis);

        match synthesizer.synthesize(&ctx, conviction) {
            Ok(rec) => {
                if !rec.lot_size_resolved {
                    diagnostics.push(Diagnostic::for_symbol(
                        DiagnosticKind::LotSizeUnresolved,
                        symbol,
                        "symbol missing from lot size table; position sizing is zero",
                    ));
                }
                if !rec.strategy.placeholder_premiums.is_empty() {
                    diagnostics.push(Diagnostic::for_symbol(
                        DiagnosticKind::PlaceholderPremium,
                        symbol,
                        format!(
                            "missing premium replaced by {} at strike(s) {:?}",
                            config.strategy_params.missing_premium_placeholder,
                            rec.strategy.placeholder_premiums
                        ),
                    ));
                }
                recommendations.push(rec);
            }
            Err(e) => diagnostics.push(Diagnostic::for_symbol(
                DiagnosticKind::SynthesisFailed,
                symbol,
                format!("recommendation withheld: {e}"),
            )),
        }
    }

    info!(
        futures_records = futures.len(),
        option_contracts = options.len(),
        signals = signals.len(),
        option_chains = option_chains.len(),
        divergences = divergences.len(),
        recommendations = recommendations.len(),
        invalid_records = diagnostics.count(DiagnosticKind::InvalidRecord),
        diagnostics = diagnostics.len(),
        "scan complete"
    );

    PipelineOutput {
        signals,
        option_chains,
        divergences,
        recommendations,
        diagnostics,
    }
}

// =============================================================================
// Decoding & sanitisation
// =============================================================================

fn decode_records<T: DeserializeOwned>(
    raw: &[Value],
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for (idx, value) in raw.iter().enumerate() {
        match T::deserialize(value) {
            Ok(record) => out.push(record),
            Err(e) => {
                let symbol = value
                    .get("symbol")
                    .and_then(Value::as_str)
                    .map(normalise_symbol);
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidRecord,
                    symbol.as_deref(),
                    format!("{label} #{idx} skipped: {e}"),
                ));
            }
        }
    }
    out
}

fn sanitise_futures(records: &[FuturesDailyRecord], diagnostics: &mut Diagnostics) -> Vec<FuturesDailyRecord> {
    let mut out = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let symbol = normalise_symbol(&record.symbol);
        let reason = if symbol.is_empty() {
            Some("empty symbol")
        } else if !record.close.is_finite() {
            Some("non-finite close")
        } else if !record.open_interest.is_finite() {
            Some("non-finite open interest")
        } else if !record.volume.is_finite() {
            Some("non-finite volume")
        } else {
            None
        };

        match reason {
            Some(reason) => diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidRecord,
                Some(symbol.as_str()),
                format!("futures record #{idx} skipped: {reason}"),
            )),
            None => out.push(FuturesDailyRecord {
                symbol,
                ..record.clone()
            }),
        }
    }
    out
}

fn sanitise_options(contracts: &[OptionContract], diagnostics: &mut Diagnostics) -> Vec<OptionContract> {
    let mut out = Vec::with_capacity(contracts.len());
    for (idx, contract) in contracts.iter().enumerate() {
        let symbol = normalise_symbol(&contract.symbol);
        let reason = if symbol.is_empty() {
            Some("empty symbol")
        } else if !contract.strike.is_finite() || contract.strike <= 0.0 {
            Some("missing or non-positive strike")
        } else if ![contract.premium, contract.open_interest, contract.volume, contract.underlying]
            .iter()
            .all(|v| v.is_finite())
        {
            Some("non-finite premium, OI, volume or underlying")
        } else {
            None
        };

        match reason {
            Some(reason) => diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidRecord,
                Some(symbol.as_str()),
                format!("option contract #{idx} skipped: {reason}"),
            )),
            None => out.push(OptionContract {
                symbol,
                expiry: contract.expiry.trim().to_string(),
                ..contract.clone()
            }),
        }
    }
    out
}

/// Group items by key, preserving the order in which each key first appears
/// and the input order within each group.
fn group_by_symbol<'a, T, F>(items: &'a [T], key: F) -> Vec<(&'a str, Vec<&'a T>)>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match index.get(k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k, groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures_intel::basis::DivergenceClass;
    use crate::runtime_config::{LotSizeTable, PremiumPolicy};
    use crate::strategy::StrategyKind;
    use crate::types::{FuturesSignal, OptionType};
    use chrono::NaiveDate;

    fn rec(symbol: &str, day: u32, close: f64, oi: f64, volume: f64) -> FuturesDailyRecord {
        FuturesDailyRecord {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            close,
            open_interest: oi,
            volume,
        }
    }

    fn contract(symbol: &str, option_type: OptionType, strike: f64, premium: f64, oi: f64, spot: f64) -> OptionContract {
        OptionContract {
            symbol: symbol.to_string(),
            expiry: "27-MAR-2025".to_string(),
            option_type,
            strike,
            premium,
            open_interest: oi,
            volume: 10.0,
            underlying: spot,
        }
    }

    /// Chain with PCR(OI) = 1.3 around spot 101.
    fn abc_chain() -> Vec<OptionContract> {
        let mut out = Vec::new();
        for (i, strike) in [96.0, 98.0, 100.0, 102.0, 104.0, 106.0].into_iter().enumerate() {
            out.push(contract("ABC", OptionType::Call, strike, 6.0 - i as f64, 100.0, 101.0));
            out.push(contract("ABC", OptionType::Put, strike, 1.0 + i as f64, 130.0, 101.0));
        }
        out
    }

    fn abc_config() -> RuntimeConfig {
        let mut lots = HashMap::new();
        lots.insert("ABC".to_string(), 100);
        RuntimeConfig {
            lot_sizes: LotSizeTable::new(lots),
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn abc_scenario_end_to_end() {
        let futures = vec![
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ];
        let out = run_pipeline(&futures, &abc_chain(), &abc_config());

        assert_eq!(out.signals.len(), 1);
        let s = &out.signals[0];
        assert_eq!(s.signal, FuturesSignal::LongBuildUp);
        assert!((s.price_change_pct - 2.0).abs() < 1e-9);
        assert_eq!(s.oi_change_pct, 10.0);
        assert!((s.volume_ratio - 1.8).abs() < 1e-9);

        let rec = out.recommendation("abc").unwrap();
        assert_eq!(rec.strategy.kind, StrategyKind::BullCallSpread);
        assert_eq!(rec.conviction.score, 4.5);
        assert!(rec.lot_size_resolved);
        assert_eq!(rec.lot_size, 100);

        // Futures 102 vs spot 101 => basis ~0.99% premium.
        assert_eq!(out.divergences.len(), 1);
        assert_eq!(out.divergences[0].classification, DivergenceClass::Premium);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn empty_chain_scores_flat_and_reaches_only_futures_rules() {
        let futures = vec![
            rec("XYZ", 3, 100.0, 1000.0, 100.0),
            rec("XYZ", 4, 103.5, 1200.0, 300.0),
        ];
        let out = run_pipeline(&futures, &[], &RuntimeConfig::default());
        assert!(out.option_chains.is_empty());
        assert!(out.divergences.is_empty());

        let rec = out.recommendation("XYZ").unwrap();
        assert!(rec.option_chain.is_none());
        let options = rec
            .conviction
            .contributions
            .iter()
            .find(|c| c.name == "options_alignment")
            .unwrap();
        assert_eq!(options.points, 1.0);
        assert_eq!(rec.strategy.kind, StrategyKind::LongFutures);
        assert_eq!(out.diagnostics.count(DiagnosticKind::LotSizeUnresolved), 1);
    }

    #[test]
    fn single_session_symbol_is_dropped_with_diagnostic() {
        let futures = vec![rec("ONE", 3, 100.0, 1000.0, 100.0)];
        let out = run_pipeline(&futures, &[], &RuntimeConfig::default());
        assert!(out.signals.is_empty());
        assert!(out.recommendations.is_empty());
        assert_eq!(out.diagnostics.count(DiagnosticKind::InsufficientHistory), 1);
    }

    #[test]
    fn invalid_records_are_skipped_not_fatal() {
        let futures = vec![
            rec("", 2, 100.0, 1000.0, 100.0),
            rec("ABC", 3, f64::NAN, 1000.0, 100.0),
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ];
        let mut options = abc_chain();
        options.push(contract("", OptionType::Call, 0.0, 1.0, 1.0, 101.0));
        options.push(contract("ABC", OptionType::Put, -5.0, 1.0, 1.0, 101.0));

        let out = run_pipeline(&futures, &options, &abc_config());
        assert_eq!(out.diagnostics.count(DiagnosticKind::InvalidRecord), 4);
        assert_eq!(out.recommendations.len(), 1);
        assert_eq!(out.option_chains[0].ledger.len(), 6);
    }

    #[test]
    fn symbols_are_normalised() {
        let futures = vec![
            rec(" abc", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC ", 4, 102.0, 1100.0, 900_000.0),
        ];
        let mut options = abc_chain();
        for c in &mut options {
            c.symbol = "abc".to_string();
        }
        let out = run_pipeline(&futures, &options, &abc_config());
        assert_eq!(out.signals.len(), 1);
        assert_eq!(out.signals[0].symbol, "ABC");
        assert!(out.option_chain("ABC").is_some());
    }

    #[test]
    fn out_of_order_dates_warn_but_use_input_order() {
        let futures = vec![
            rec("ABC", 4, 100.0, 1000.0, 500_000.0),
            rec("ABC", 3, 102.0, 1100.0, 900_000.0),
        ];
        let out = run_pipeline(&futures, &[], &abc_config());
        assert_eq!(out.diagnostics.count(DiagnosticKind::NonChronological), 1);
        assert_eq!(out.signals[0].signal, FuturesSignal::LongBuildUp);
    }

    #[test]
    fn strict_premium_policy_withholds_recommendation() {
        let futures = vec![
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ];
        let mut options = abc_chain();
        for c in &mut options {
            c.premium = 0.0;
        }
        let mut config = abc_config();
        config.strategy_params.premium_policy = PremiumPolicy::Strict;

        let out = run_pipeline(&futures, &options, &config);
        assert!(out.recommendations.is_empty());
        assert_eq!(out.signals.len(), 1);
        assert_eq!(out.diagnostics.count(DiagnosticKind::SynthesisFailed), 1);

        config.strategy_params.premium_policy = PremiumPolicy::Placeholder;
        let out = run_pipeline(&futures, &options, &config);
        assert_eq!(out.recommendations.len(), 1);
        assert_eq!(out.diagnostics.count(DiagnosticKind::PlaceholderPremium), 1);
    }

    #[test]
    fn rerun_is_idempotent() {
        let futures = vec![
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
            rec("XYZ", 3, 50.0, 10.0, 5.0),
            rec("XYZ", 4, 49.0, 12.0, 6.0),
        ];
        let config = abc_config();
        let a = run_pipeline(&futures, &abc_chain(), &config);
        let b = run_pipeline(&futures, &abc_chain(), &config);
        assert_eq!(a, b);
        // XYZ: OI +20% sorts ahead of ABC's +10%.
        assert_eq!(a.signals[0].symbol, "XYZ");
    }

    #[test]
    fn raw_scan_decodes_aliases_and_defaults() {
        let json = r#"{
            "futures": [
                {"symbol": "ABC", "date": "2025-03-03", "close": 100.0, "open_interest": 10, "volume": 5},
                {"symbol": "ABC", "date": "2025-03-04", "close": 101.0}
            ],
            "options": [{"symbol": "ABC", "expiry": "MAR", "option_type": "CE", "strike": 100, "premium": 2.5}]
        }"#;
        let input: ScanInput = serde_json::from_str(json).unwrap();
        let out = run_scan(&input, &abc_config());

        assert_eq!(out.diagnostics.count(DiagnosticKind::InvalidRecord), 0);
        assert_eq!(out.signals.len(), 1);
        let chain = out.option_chain("ABC").unwrap();
        let row = chain.ledger.get(100.0).unwrap();
        assert_eq!(row.call_premium, 2.5);
        assert_eq!(row.call_oi, 0.0);
    }

    #[test]
    fn undecodable_records_are_skipped_with_diagnostic() {
        let mut futures: Vec<Value> = [
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ]
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
        futures.push(serde_json::json!({"symbol": "abc", "date": "not-a-date", "close": 1.0}));

        let mut options: Vec<Value> = abc_chain()
            .iter()
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();
        // Missing symbol and strike.
        options.push(serde_json::json!({"expiry": "MAR", "option_type": "PE", "premium": 1.0}));

        let out = run_scan(&ScanInput { futures, options }, &abc_config());

        assert_eq!(out.diagnostics.len(), 2);
        assert_eq!(out.diagnostics.count(DiagnosticKind::InvalidRecord), 2);
        assert_eq!(out.diagnostics.for_symbol("ABC").count(), 1);
        assert_eq!(out.recommendations.len(), 1);
        assert_eq!(out.option_chains[0].ledger.len(), 6);
    }
}
