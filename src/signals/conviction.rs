// =============================================================================
// Conviction Scorer — Bucketed evidence aggregation
// =============================================================================
//
// Five independent contributions are summed, clamped to [0, 10] and rounded
// to one decimal:
//
//   |OI change %|     >10 => 2.5   >5   => 1.5   >2   => 1.0
//   volume ratio      >2  => 2.0   >1.5 => 1.5   >1.1 => 0.5
//   streak            >=3 => 2.0   =2   => 1.0   =1   => 0.5
//   |price change %|  >3  => 1.5   >1.5 => 1.0   >0.5 => 0.5
//   options alignment (see `options_alignment`)

use serde::{Deserialize, Serialize};

use crate::futures_intel::ClassifiedSignal;
use crate::options::OptionChainAnalysis;
use crate::types::Bias;

pub const MAX_CONVICTION: f64 = 10.0;

/// Points awarded when no option chain exists for the symbol.
const NO_OPTIONS_POINTS: f64 = 1.0;

/// The contribution of a single factor to the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub name: String,
    pub input: f64,
    pub points: f64,
}

/// Result of the conviction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvictionScore {
    /// In [0, 10], one decimal place.
    pub score: f64,
    pub contributions: Vec<FactorContribution>,
}

pub struct ConvictionScorer;

impl ConvictionScorer {
    pub fn score(signal: &ClassifiedSignal, analysis: Option<&OptionChainAnalysis>) -> ConvictionScore {
        let oi_abs = signal.oi_change_pct.abs();
        let price_abs = signal.price_change_pct.abs();

        let mut contributions = vec![
            FactorContribution {
                name: "oi_change".to_string(),
                input: oi_abs,
                points: oi_change_points(oi_abs),
            },
            FactorContribution {
                name: "volume_ratio".to_string(),
                input: signal.volume_ratio,
                points: volume_points(signal.volume_ratio),
            },
            FactorContribution {
                name: "streak".to_string(),
                input: signal.streak as f64,
                points: streak_points(signal.streak),
            },
            FactorContribution {
                name: "price_change".to_string(),
                input: price_abs,
                points: price_change_points(price_abs),
            },
        ];

        let (pcr_input, alignment) = match analysis {
            Some(a) => (a.pcr_oi, options_alignment(signal.signal.bias(), a.pcr_oi)),
            None => (0.0, NO_OPTIONS_POINTS),
        };
        contributions.push(FactorContribution {
            name: "options_alignment".to_string(),
            input: pcr_input,
            points: alignment,
        });

        let raw: f64 = contributions.iter().map(|c| c.points).sum();
        let score = (raw.clamp(0.0, MAX_CONVICTION) * 10.0).round() / 10.0;

        ConvictionScore { score, contributions }
    }
}

fn oi_change_points(oi_abs: f64) -> f64 {
    if oi_abs > 10.0 {
        2.5
    } else if oi_abs > 5.0 {
        1.5
    } else if oi_abs > 2.0 {
        1.0
    } else {
        0.0
    }
}

fn volume_points(ratio: f64) -> f64 {
    if ratio > 2.0 {
        2.0
    } else if ratio > 1.5 {
        1.5
    } else if ratio > 1.1 {
        0.5
    } else {
        0.0
    }
}

fn streak_points(streak: u32) -> f64 {
    match streak {
        0 => 0.0,
        1 => 0.5,
        2 => 1.0,
        _ => 2.0,
    }
}

fn price_change_points(price_abs: f64) -> f64 {
    if price_abs > 3.0 {
        1.5
    } else if price_abs > 1.5 {
        1.0
    } else if price_abs > 0.5 {
        0.5
    } else {
        0.0
    }
}

/// Bullish readings want a low PCR, bearish readings a high one.
fn options_alignment(bias: Bias, pcr_oi: f64) -> f64 {
    match bias {
        Bias::Bullish if pcr_oi < 0.8 => 2.0,
        Bias::Bullish if pcr_oi < 1.0 => 1.0,
        Bias::Bearish if pcr_oi > 1.2 => 2.0,
        Bias::Bearish if pcr_oi > 1.0 => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StrikeLedger;
    use crate::types::FuturesSignal;

    fn signal(kind: FuturesSignal, price: f64, oi: f64, vol: f64, streak: u32) -> ClassifiedSignal {
        ClassifiedSignal {
            symbol: "ABC".to_string(),
            signal: kind,
            price_change_pct: price,
            oi_change_pct: oi,
            volume_ratio: vol,
            streak,
            last_close: 100.0,
        }
    }

    fn analysis(pcr: f64) -> OptionChainAnalysis {
        OptionChainAnalysis {
            symbol: "ABC".to_string(),
            expiry: "MAR".to_string(),
            spot: 100.0,
            pcr_oi: pcr,
            pcr_volume: 1.0,
            atm_iv_proxy: 0.0,
            atm_strike: 100.0,
            max_pain: 100.0,
            support: 95.0,
            resistance: 105.0,
            total_call_oi: 1.0,
            total_put_oi: pcr,
            ledger: StrikeLedger::default(),
        }
    }

    #[test]
    fn scenario_long_build_up_without_alignment() {
        let s = signal(FuturesSignal::LongBuildUp, 2.0, 10.0, 1.8, 1);
        // 1.5 (OI, 10 is not > 10) + 1.5 + 0.5 + 1.0 + 0 (PCR 1.3 is not bullish-aligned)
        let c = ConvictionScorer::score(&s, Some(&analysis(1.3)));
        assert_eq!(c.score, 4.5);
        assert_eq!(c.contributions.len(), 5);
    }

    #[test]
    fn absent_options_award_flat_point() {
        let s = signal(FuturesSignal::Neutral, 0.0, 0.0, 1.0, 1);
        let c = ConvictionScorer::score(&s, None);
        assert_eq!(c.score, 1.5);
        let options = c.contributions.iter().find(|f| f.name == "options_alignment").unwrap();
        assert_eq!(options.points, 1.0);
    }

    #[test]
    fn maximum_evidence_hits_ten() {
        let s = signal(FuturesSignal::ShortBuildUp, -4.0, 15.0, 3.0, 5);
        let c = ConvictionScorer::score(&s, Some(&analysis(1.5)));
        assert_eq!(c.score, 10.0);
    }

    #[test]
    fn alignment_buckets() {
        assert_eq!(options_alignment(Bias::Bullish, 0.7), 2.0);
        assert_eq!(options_alignment(Bias::Bullish, 0.9), 1.0);
        assert_eq!(options_alignment(Bias::Bullish, 1.0), 0.0);
        assert_eq!(options_alignment(Bias::Bearish, 1.3), 2.0);
        assert_eq!(options_alignment(Bias::Bearish, 1.1), 1.0);
        assert_eq!(options_alignment(Bias::Bearish, 1.0), 0.0);
        assert_eq!(options_alignment(Bias::Neutral, 0.1), 0.0);
    }

    #[test]
    fn score_bounded_and_monotone_in_each_factor() {
        let base = signal(FuturesSignal::LongBuildUp, 1.0, 3.0, 1.2, 1);
        let mut last = 0.0;
        for oi in [0.0, 2.5, 6.0, 11.0, 50.0] {
            let mut s = base.clone();
            s.oi_change_pct = -oi;
            let c = ConvictionScorer::score(&s, None).score;
            assert!((0.0..=MAX_CONVICTION).contains(&c));
            assert!(c >= last);
            last = c;
        }
        let mut last = 0.0;
        for streak in 1..6 {
            let mut s = base.clone();
            s.streak = streak;
            let c = ConvictionScorer::score(&s, None).score;
            assert!(c >= last);
            last = c;
        }
        let mut last = 0.0;
        for vol in [0.5, 1.2, 1.6, 2.5] {
            let mut s = base.clone();
            s.volume_ratio = vol;
            let c = ConvictionScorer::score(&s, None).score;
            assert!(c >= last);
            last = c;
        }
        // Price moves count by magnitude, in either direction.
        for sign in [1.0, -1.0] {
            let mut last = 0.0;
            for price in [0.0, 0.6, 1.6, 3.1, 12.0] {
                let mut s = base.clone();
                s.price_change_pct = sign * price;
                let c = ConvictionScorer::score(&s, None).score;
                assert!((0.0..=MAX_CONVICTION).contains(&c));
                assert!(c >= last);
                last = c;
            }
            assert_eq!(last, ConvictionScorer::score(&base, None).score + 1.0);
        }
    }

    #[test]
    fn score_monotone_in_options_alignment() {
        // Bullish: conviction never falls as PCR(OI) falls.
        let bullish = signal(FuturesSignal::LongBuildUp, 1.0, 3.0, 1.2, 1);
        let mut last = 0.0;
        for pcr in [3.0, 1.2, 1.0, 0.95, 0.8, 0.79, 0.1] {
            let c = ConvictionScorer::score(&bullish, Some(&analysis(pcr))).score;
            assert!((0.0..=MAX_CONVICTION).contains(&c));
            assert!(c >= last, "bullish score fell to {c} at PCR {pcr}");
            last = c;
        }
        let flat = ConvictionScorer::score(&bullish, Some(&analysis(3.0))).score;
        assert_eq!(last, flat + 2.0);

        // Bearish: conviction never falls as PCR(OI) rises.
        let bearish = signal(FuturesSignal::ShortBuildUp, -1.0, 3.0, 1.2, 1);
        let mut last = 0.0;
        for pcr in [0.0, 0.8, 1.0, 1.05, 1.2, 1.21, 4.0] {
            let c = ConvictionScorer::score(&bearish, Some(&analysis(pcr))).score;
            assert!((0.0..=MAX_CONVICTION).contains(&c));
            assert!(c >= last, "bearish score fell to {c} at PCR {pcr}");
            last = c;
        }
        let flat = ConvictionScorer::score(&bearish, Some(&analysis(0.0))).score;
        assert_eq!(last, flat + 2.0);
    }
}
