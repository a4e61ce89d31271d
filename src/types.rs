// =============================================================================
// Shared types used across the F&O scanner
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of a futures contract, already column-normalised by the
/// ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesDailyRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub open_interest: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    #[serde(alias = "CE")]
    Call,
    #[serde(alias = "PE")]
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// A single option contract from a one-day chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub expiry: String,
    pub option_type: OptionType,
    pub strike: f64,
    /// Closing premium.
    #[serde(default)]
    pub premium: f64,
    #[serde(default)]
    pub open_interest: f64,
    #[serde(default)]
    pub volume: f64,
    /// Spot price of the underlying at snapshot time.
    #[serde(default)]
    pub underlying: f64,
}

/// Directional reading derived from the last two days of price and OI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuturesSignal {
    LongBuildUp,
    ShortBuildUp,
    LongUnwinding,
    ShortCovering,
    Neutral,
}

impl FuturesSignal {
    /// Map a (price change, OI change) sign pair to a signal.  A change of
    /// exactly zero on either axis is neutral.
    pub fn from_changes(price_change: f64, oi_change: f64) -> Self {
        if price_change > 0.0 && oi_change > 0.0 {
            Self::LongBuildUp
        } else if price_change < 0.0 && oi_change > 0.0 {
            Self::ShortBuildUp
        } else if price_change < 0.0 && oi_change < 0.0 {
            Self::LongUnwinding
        } else if price_change > 0.0 && oi_change < 0.0 {
            Self::ShortCovering
        } else {
            Self::Neutral
        }
    }

    pub fn bias(self) -> Bias {
        match self {
            Self::LongBuildUp | Self::ShortCovering => Bias::Bullish,
            Self::ShortBuildUp | Self::LongUnwinding => Bias::Bearish,
            Self::Neutral => Bias::Neutral,
        }
    }

    /// Human-readable label used in rationale text.
    pub fn label(self) -> &'static str {
        match self {
            Self::LongBuildUp => "Long build-up",
            Self::ShortBuildUp => "Short build-up",
            Self::LongUnwinding => "Long unwinding",
            Self::ShortCovering => "Short covering",
            Self::Neutral => "Neutral",
        }
    }
}

impl std::fmt::Display for FuturesSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LongBuildUp => write!(f, "LONG_BUILD_UP"),
            Self::ShortBuildUp => write!(f, "SHORT_BUILD_UP"),
            Self::LongUnwinding => write!(f, "LONG_UNWINDING"),
            Self::ShortCovering => write!(f, "SHORT_COVERING"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Directional bucket of a futures signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}
