// =============================================================================
// Strategy Synthesizer — From signals to a concrete trade structure
// =============================================================================
//
// Evaluates one symbol after the classifier, option chain analyzer, basis
// detector and conviction scorer have run, and produces a single
// recommendation.
//
// The decision tree is an ordered rule table; the first rule whose predicate
// holds builds the structure:
//
//   1. SHORT_BUILD_UP + options + PCR < 0.8             => Bear Put Spread
//   2. LONG_BUILD_UP  + options + PCR > 1.0             => Bull Call Spread
//   3. SHORT_BUILD_UP + volume ratio > 2.0              => Short Futures
//   4. LONG_BUILD_UP  + volume ratio > 2.0              => Long Futures
//   5. |price| < 0.5% + options + 0.8 <= PCR <= 1.2     => Iron Condor
//   6. SHORT_COVERING + volume ratio < 1.0 + options    => Sell Call (credit)
//   7. LONG_UNWINDING + volume ratio < 1.0 + options    => Sell Put (credit)
//   otherwise                                           => No Trade / Watch
// =============================================================================

pub mod builders;
pub mod strikes;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::futures_intel::{ClassifiedSignal, DivergenceSignal};
use crate::options::{OptionChainAnalysis, StrikeRow};
use crate::runtime_config::{LotSizeTable, PremiumPolicy, StrategyParams};
use crate::signals::ConvictionScore;
use crate::types::{FuturesSignal, OptionType};

// =============================================================================
// Output types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    BearPutSpread,
    BullCallSpread,
    ShortFutures,
    LongFutures,
    IronCondor,
    SellCall,
    SellPut,
    NoTrade,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::BearPutSpread => "Bear Put Spread",
            Self::BullCallSpread => "Bull Call Spread",
            Self::ShortFutures => "Short Futures",
            Self::LongFutures => "Long Futures",
            Self::IronCondor => "Iron Condor",
            Self::SellCall => "Sell Call (credit)",
            Self::SellPut => "Sell Put (credit)",
            Self::NoTrade => "No Trade / Watch",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    Futures,
    Option { option_type: OptionType, strike: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    pub action: LegAction,
    pub instrument: Instrument,
    pub price: f64,
    /// Units (one lot); 0 when the lot size is unresolved.
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PremiumFlow {
    Debit,
    Credit,
    None,
}

pub const UNDEFINED_RISK_LABEL: &str = "Undefined (High Risk)";
pub const NO_RATIO_LABEL: &str = "N/A";

/// A fully specified trade structure with payoff figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPlan {
    pub kind: StrategyKind,
    pub name: String,
    pub legs: Vec<StrategyLeg>,
    /// Per-unit net premium: positive when received, negative when paid.
    pub net_premium: f64,
    pub premium_flow: PremiumFlow,
    /// Lot-scaled.
    pub max_profit: f64,
    /// Lot-scaled; `None` when the loss is unbounded.
    pub max_loss: Option<f64>,
    pub breakevens: Vec<f64>,
    pub risk_reward: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Strikes whose premium was missing and replaced by the placeholder.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub placeholder_premiums: Vec<f64>,
}

impl StrategyPlan {
    pub fn no_trade() -> Self {
        Self {
            kind: StrategyKind::NoTrade,
            name: StrategyKind::NoTrade.name().to_string(),
            legs: Vec::new(),
            net_premium: 0.0,
            premium_flow: PremiumFlow::None,
            max_profit: 0.0,
            max_loss: Some(0.0),
            breakevens: Vec::new(),
            risk_reward: NO_RATIO_LABEL.to_string(),
            target: None,
            stop_loss: None,
            placeholder_premiums: Vec::new(),
        }
    }
}

/// Final per-symbol bundle handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub symbol: String,
    pub signal: ClassifiedSignal,
    pub conviction: ConvictionScore,
    pub strategy: StrategyPlan,
    pub rationale: Vec<String>,
    pub lot_size: u32,
    /// False when the symbol is missing from the lot size table; every
    /// size-scaled figure is then zero.
    pub lot_size_resolved: bool,
    pub option_chain: Option<OptionChainAnalysis>,
    pub divergence: Option<DivergenceSignal>,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    MissingOptionChain { symbol: String },
    EmptyStrikeLadder { symbol: String },
    MissingPremium { symbol: String, strike: f64, option_type: OptionType },
}

impl std::fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOptionChain { symbol } => {
                write!(f, "{symbol}: option chain required but absent")
            }
            Self::EmptyStrikeLadder { symbol } => write!(f, "{symbol}: strike ladder is empty"),
            Self::MissingPremium { symbol, strike, option_type } => {
                write!(f, "{symbol}: missing premium for {strike} {option_type}")
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

// =============================================================================
// Rule table
// =============================================================================

/// Everything the decision tree may look at for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct SymbolContext<'a> {
    pub signal: &'a ClassifiedSignal,
    pub analysis: Option<&'a OptionChainAnalysis>,
    pub divergence: Option<&'a DivergenceSignal>,
}

impl<'a> SymbolContext<'a> {
    pub fn pcr_oi(&self) -> Option<f64> {
        self.analysis.map(|a| a.pcr_oi)
    }

    /// Spot used for strike targeting: the chain's spot, then the basis
    /// detector's spot, then the latest futures close.
    pub fn reference_price(&self) -> f64 {
        self.analysis
            .map(|a| a.spot)
            .filter(|s| *s > 0.0)
            .or_else(|| self.divergence.map(|d| d.spot_price).filter(|s| *s > 0.0))
            .unwrap_or(self.signal.last_close)
    }
}

pub type RulePredicate = fn(&SymbolContext<'_>) -> bool;
pub type RuleBuilder =
    fn(&StrategySynthesizer<'_>, &SymbolContext<'_>, &mut Vec<String>) -> Result<StrategyPlan, SynthesisError>;

pub struct StrategyRule {
    pub kind: StrategyKind,
    pub applies: RulePredicate,
    pub build: RuleBuilder,
}

/// Evaluated top to bottom; first match wins.
pub const RULES: &[StrategyRule] = &[
    StrategyRule {
        kind: StrategyKind::BearPutSpread,
        applies: bearish_build_up_low_pcr,
        build: builders::bear_put_spread,
    },
    StrategyRule {
        kind: StrategyKind::BullCallSpread,
        applies: bullish_build_up_high_pcr,
        build: builders::bull_call_spread,
    },
    StrategyRule {
        kind: StrategyKind::ShortFutures,
        applies: short_build_up_heavy_volume,
        build: builders::short_futures,
    },
    StrategyRule {
        kind: StrategyKind::LongFutures,
        applies: long_build_up_heavy_volume,
        build: builders::long_futures,
    },
    StrategyRule {
        kind: StrategyKind::IronCondor,
        applies: range_bound_balanced_pcr,
        build: builders::iron_condor,
    },
    StrategyRule {
        kind: StrategyKind::SellCall,
        applies: weak_short_covering,
        build: builders::sell_call,
    },
    StrategyRule {
        kind: StrategyKind::SellPut,
        applies: weak_long_unwinding,
        build: builders::sell_put,
    },
];

fn bearish_build_up_low_pcr(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::ShortBuildUp && ctx.pcr_oi().is_some_and(|p| p < 0.8)
}

fn bullish_build_up_high_pcr(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::LongBuildUp && ctx.pcr_oi().is_some_and(|p| p > 1.0)
}

fn short_build_up_heavy_volume(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::ShortBuildUp && ctx.signal.volume_ratio > 2.0
}

fn long_build_up_heavy_volume(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::LongBuildUp && ctx.signal.volume_ratio > 2.0
}

fn range_bound_balanced_pcr(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.price_change_pct.abs() < 0.5 && ctx.pcr_oi().is_some_and(|p| (0.8..=1.2).contains(&p))
}

fn weak_short_covering(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::ShortCovering
        && ctx.signal.volume_ratio < 1.0
        && ctx.analysis.is_some()
}

fn weak_long_unwinding(ctx: &SymbolContext<'_>) -> bool {
    ctx.signal.signal == FuturesSignal::LongUnwinding
        && ctx.signal.volume_ratio < 1.0
        && ctx.analysis.is_some()
}

/// First rule whose predicate holds, or `None` for the watch-list fallback.
pub fn select_rule(ctx: &SymbolContext<'_>) -> Option<&'static StrategyRule> {
    RULES.iter().find(|rule| (rule.applies)(ctx))
}

// =============================================================================
// Synthesizer
// =============================================================================

/// Builds recommendations against an immutable lot size table and strategy
/// parameters supplied at construction.
pub struct StrategySynthesizer<'a> {
    lot_sizes: &'a LotSizeTable,
    params: &'a StrategyParams,
}

impl<'a> StrategySynthesizer<'a> {
    pub fn new(lot_sizes: &'a LotSizeTable, params: &'a StrategyParams) -> Self {
        Self { lot_sizes, params }
    }

    pub fn params(&self) -> &StrategyParams {
        self.params
    }

    pub fn lot_size(&self, symbol: &str) -> u32 {
        self.lot_sizes.resolve(symbol)
    }

    /// Premium for one side of a ledger row, applying the configured policy
    /// when the quote is missing.  Substituted strikes are appended to
    /// `placeholders`.
    pub fn leg_premium(
        &self,
        symbol: &str,
        row: &StrikeRow,
        option_type: OptionType,
        placeholders: &mut Vec<f64>,
    ) -> Result<f64, SynthesisError> {
        let premium = row.premium(option_type);
        if premium > 0.0 && premium.is_finite() {
            return Ok(premium);
        }
        match self.params.premium_policy {
            PremiumPolicy::Strict => Err(SynthesisError::MissingPremium {
                symbol: symbol.to_string(),
                strike: row.strike,
                option_type,
            }),
            PremiumPolicy::Placeholder => {
                warn!(
                    symbol,
                    strike = row.strike,
                    option_type = %option_type,
                    placeholder = self.params.missing_premium_placeholder,
                    "missing premium replaced by placeholder"
                );
                placeholders.push(row.strike);
                Ok(self.params.missing_premium_placeholder)
            }
        }
    }

    /// Run the decision tree for one symbol.
    pub fn synthesize(
        &self,
        ctx: &SymbolContext<'_>,
        conviction: ConvictionScore,
    ) -> Result<StrategyRecommendation, SynthesisError> {
        let symbol = ctx.signal.symbol.as_str();
        let lot_size = self.lot_size(symbol);
        let lot_size_resolved = lot_size > 0;

        let mut rationale = base_rationale(ctx);

        let strategy = match select_rule(ctx) {
            Some(rule) => {
                debug!(symbol, rule = %rule.kind, "strategy rule matched");
                let mut notes = Vec::new();
                let plan = (rule.build)(self, ctx, &mut notes)?;
                rationale.extend(notes);
                plan
            }
            None => {
                rationale.push("No rule matched; keep on watch list".to_string());
                StrategyPlan::no_trade()
            }
        };

        if !lot_size_resolved {
            rationale.push(format!(
                "Lot size unresolved for {symbol}; size-scaled figures are zero"
            ));
        }

        debug!(
            symbol,
            strategy = %strategy.kind,
            conviction = conviction.score,
            lot_size,
            "strategy synthesized"
        );

        Ok(StrategyRecommendation {
            symbol: symbol.to_string(),
            signal: ctx.signal.clone(),
            conviction,
            strategy,
            rationale,
            lot_size,
            lot_size_resolved,
            option_chain: ctx.analysis.cloned(),
            divergence: ctx.divergence.cloned(),
        })
    }
}

fn base_rationale(ctx: &SymbolContext<'_>) -> Vec<String> {
    let s = ctx.signal;
    let mut lines = vec![format!(
        "{}: price {:+.2}%, OI {:+.2}%, volume {:.2}x average, {}-day streak",
        s.signal.label(),
        s.price_change_pct,
        s.oi_change_pct,
        s.volume_ratio,
        s.streak
    )];
    match ctx.analysis {
        Some(a) => lines.push(format!(
            "Options ({}): PCR {:.2}, max pain {}, support {}, resistance {}",
            a.expiry, a.pcr_oi, a.max_pain, a.support, a.resistance
        )),
        None => lines.push("No option chain available".to_string()),
    }
    if let Some(d) = ctx.divergence {
        lines.push(format!(
            "Futures basis {:+.2}% ({})",
            d.basis_pct, d.classification
        ));
    }
    lines
}
