// =============================================================================
// Open Interest Classifier — Price/OI build-up signal with streak context
// =============================================================================
//
// Compares the last two sessions of each symbol's futures history:
//
//   price up   + OI up    =>  LONG_BUILD_UP   (fresh longs)
//   price down + OI up    =>  SHORT_BUILD_UP  (fresh shorts)
//   price down + OI down  =>  LONG_UNWINDING  (longs exiting)
//   price up   + OI down  =>  SHORT_COVERING  (shorts exiting)
//   any zero change       =>  NEUTRAL
//
// The streak counts how many consecutive sessions (ending today) produced the
// same reading.  Volume ratio compares today's volume with the mean of up to
// five preceding sessions.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::roc::{pct_change, trailing_mean};
use crate::types::{FuturesDailyRecord, FuturesSignal};

/// Number of preceding sessions averaged for the volume baseline.
const VOLUME_LOOKBACK: usize = 5;

/// Classifier output for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSignal {
    pub symbol: String,
    pub signal: FuturesSignal,
    pub price_change_pct: f64,
    pub oi_change_pct: f64,
    pub volume_ratio: f64,
    /// Consecutive sessions with the same signal, always >= 1.
    pub streak: u32,
    /// Latest futures close, carried for downstream sizing.
    pub last_close: f64,
}

/// Stateless classifier over grouped, chronologically ordered histories.
pub struct OpenInterestClassifier;

impl OpenInterestClassifier {
    /// Classify every symbol group.  Symbols with fewer than two sessions are
    /// skipped.  Output is sorted by OI change % descending; ties keep the
    /// group order.  Histories may hold records or references to them.
    pub fn classify_all<'a, R, I>(groups: I) -> Vec<ClassifiedSignal>
    where
        R: Borrow<FuturesDailyRecord> + 'a,
        I: IntoIterator<Item = (&'a str, &'a [R])>,
    {
        let mut out: Vec<ClassifiedSignal> = groups
            .into_iter()
            .filter_map(|(symbol, history)| Self::classify(symbol, history))
            .collect();

        // `sort_by` is stable, so equal OI changes stay in input order.
        out.sort_by(|a, b| b.oi_change_pct.total_cmp(&a.oi_change_pct));
        out
    }

    /// Classify one symbol's history.  Returns `None` with fewer than two
    /// sessions.
    pub fn classify<R>(symbol: &str, history: &[R]) -> Option<ClassifiedSignal>
    where
        R: Borrow<FuturesDailyRecord>,
    {
        let n = history.len();
        if n < 2 {
            return None;
        }

        let today: &FuturesDailyRecord = history[n - 1].borrow();
        let prior: &FuturesDailyRecord = history[n - 2].borrow();
        let signal = Self::session_signal(prior, today);

        let price_change_pct = pct_change(prior.close, today.close);
        let oi_change_pct = pct_change(prior.open_interest, today.open_interest);

        // Walk backward through earlier session pairs.
        let mut streak: u32 = 1;
        for t in (1..n - 1).rev() {
            if Self::session_signal(history[t - 1].borrow(), history[t].borrow()) != signal {
                break;
            }
            streak += 1;
        }

        let preceding: Vec<f64> = history[..n - 1].iter().map(|r| Borrow::<FuturesDailyRecord>::borrow(r).volume).collect();
        let volume_ratio = match trailing_mean(&preceding, VOLUME_LOOKBACK) {
            Some(avg) if avg > 0.0 => today.volume / avg,
            _ => 1.0,
        };

        debug!(
            symbol,
            signal = %signal,
            price_change_pct = format!("{:.2}", price_change_pct),
            oi_change_pct = format!("{:.2}", oi_change_pct),
            volume_ratio = format!("{:.2}", volume_ratio),
            streak,
            "futures session classified"
        );

        Some(ClassifiedSignal {
            symbol: symbol.to_string(),
            signal,
            price_change_pct,
            oi_change_pct,
            volume_ratio,
            streak,
            last_close: today.close,
        })
    }

    fn session_signal(prior: &FuturesDailyRecord, today: &FuturesDailyRecord) -> FuturesSignal {
        FuturesSignal::from_changes(
            today.close - prior.close,
            today.open_interest - prior.open_interest,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn long_build_up_scenario() {
        let history = vec![
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ];
        let s = OpenInterestClassifier::classify("ABC", &history).unwrap();
        assert_eq!(s.signal, FuturesSignal::LongBuildUp);
        assert!((s.price_change_pct - 2.0).abs() < 1e-9);
        assert!((s.oi_change_pct - 10.0).abs() < 1e-9);
        assert!((s.volume_ratio - 1.8).abs() < 1e-9);
        assert_eq!(s.streak, 1);
        assert_eq!(s.last_close, 102.0);
    }

    #[test]
    fn single_session_is_skipped() {
        let history = vec![rec("ABC", 3, 100.0, 1000.0, 10.0)];
        assert!(OpenInterestClassifier::classify("ABC", &history).is_none());
    }

    #[test]
    fn streak_counts_consecutive_matches() {
        let history = vec![
            rec("X", 3, 100.0, 1000.0, 10.0),
            rec("X", 4, 99.0, 1200.0, 10.0), // short build-up, broken below
            rec("X", 5, 100.0, 1300.0, 10.0),
            rec("X", 6, 101.0, 1400.0, 10.0),
            rec("X", 7, 102.0, 1500.0, 10.0),
        ];
        let s = OpenInterestClassifier::classify("X", &history).unwrap();
        assert_eq!(s.signal, FuturesSignal::LongBuildUp);
        assert_eq!(s.streak, 3);
    }

    #[test]
    fn streak_runs_to_start_of_history() {
        let history = vec![
            rec("X", 3, 100.0, 1000.0, 10.0),
            rec("X", 4, 98.0, 900.0, 10.0),
            rec("X", 5, 97.0, 800.0, 10.0),
        ];
        let s = OpenInterestClassifier::classify("X", &history).unwrap();
        assert_eq!(s.signal, FuturesSignal::LongUnwinding);
        assert_eq!(s.streak, 2);
    }

    #[test]
    fn volume_baseline_uses_last_five_prior_sessions() {
        let mut history: Vec<FuturesDailyRecord> = (1..=6)
            .map(|d| rec("V", d, 100.0 + d as f64, 1000.0 + d as f64, 100.0))
            .collect();
        // Oldest session is outside the 5-day window.
        history[0].volume = 10_000.0;
        history.push(rec("V", 7, 120.0, 2000.0, 300.0));
        let s = OpenInterestClassifier::classify("V", &history).unwrap();
        assert!((s.volume_ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_volume_baseline_defaults_ratio_to_one() {
        let history = vec![rec("Z", 3, 100.0, 10.0, 0.0), rec("Z", 4, 101.0, 11.0, 500.0)];
        let s = OpenInterestClassifier::classify("Z", &history).unwrap();
        assert_eq!(s.volume_ratio, 1.0);
    }

    #[test]
    fn zero_prior_oi_gives_zero_pct() {
        let history = vec![rec("Z", 3, 100.0, 0.0, 10.0), rec("Z", 4, 101.0, 50.0, 10.0)];
        let s = OpenInterestClassifier::classify("Z", &history).unwrap();
        assert_eq!(s.signal, FuturesSignal::LongBuildUp);
        assert_eq!(s.oi_change_pct, 0.0);
        assert!(s.oi_change_pct.is_finite());
    }

    #[test]
    fn borrowed_history_classifies_like_owned() {
        let history = vec![
            rec("ABC", 3, 100.0, 1000.0, 500_000.0),
            rec("ABC", 4, 102.0, 1100.0, 900_000.0),
        ];
        let refs: Vec<&FuturesDailyRecord> = history.iter().collect();
        assert_eq!(
            OpenInterestClassifier::classify("ABC", &refs),
            OpenInterestClassifier::classify("ABC", &history)
        );
    }

    #[test]
    fn output_sorted_by_oi_change_with_stable_ties() {
        let a = vec![rec("A", 3, 100.0, 100.0, 1.0), rec("A", 4, 101.0, 105.0, 1.0)];
        let b = vec![rec("B", 3, 100.0, 100.0, 1.0), rec("B", 4, 99.0, 120.0, 1.0)];
        let c = vec![rec("C", 3, 100.0, 200.0, 1.0), rec("C", 4, 100.5, 210.0, 1.0)];
        let groups: Vec<(&str, &[FuturesDailyRecord])> =
            vec![("A", a.as_slice()), ("B", b.as_slice()), ("C", c.as_slice())];
        let out = OpenInterestClassifier::classify_all(groups);
        let order: Vec<&str> = out.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }
}
