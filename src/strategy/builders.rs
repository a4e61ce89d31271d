// =============================================================================
// Strategy Builders — Legs and payoff math per structure
// =============================================================================
//
// Debit spreads (bear put, bull call):
//   debit       = long premium - short premium
//   max profit  = (width - debit) * lot
//   max loss    = debit * lot
//   breakeven   = long strike -/+ debit
//
// Iron condor (credit):
//   credit      = short put + short call - long put - long call
//   max profit  = credit * lot
//   max loss    = (widest wing - credit) * lot
//   breakevens  = short put - credit, short call + credit
//
// Futures: target/stop from support/resistance when the chain exists,
// otherwise fixed percentages around spot.  A level on the wrong side of
// entry falls back to the percentage level around entry:
//   max profit  = |target - entry| * lot
//   max loss    = |entry - stop| * lot
//
// Naked credit legs: max profit = premium * lot, loss is unbounded.
//
// Risk:reward ratios use per-unit figures so an unresolved lot size does not
// erase them.

use crate::options::{OptionChainAnalysis, StrikeLedger};
use crate::types::OptionType;

use super::strikes::select_strike;
use super::{
    Instrument, LegAction, PremiumFlow, StrategyKind, StrategyLeg, StrategyPlan,
    StrategySynthesizer, SymbolContext, SynthesisError, NO_RATIO_LABEL, UNDEFINED_RISK_LABEL,
};

/// "1:X" where X = |reward| / |risk|.
pub fn risk_reward_ratio(reward: f64, risk: f64) -> String {
    if risk.abs() < f64::EPSILON || !risk.is_finite() || !reward.is_finite() {
        return NO_RATIO_LABEL.to_string();
    }
    format!("1:{:.2}", reward.abs() / risk.abs())
}

fn require_chain<'a>(ctx: &SymbolContext<'a>) -> Result<&'a OptionChainAnalysis, SynthesisError> {
    ctx.analysis.ok_or_else(|| SynthesisError::MissingOptionChain {
        symbol: ctx.signal.symbol.clone(),
    })
}

/// Priced option legs for one structure, tracking placeholder substitutions.
struct OptionLegs<'s, 'a> {
    synth: &'s StrategySynthesizer<'a>,
    symbol: &'s str,
    ledger: &'s StrikeLedger,
    strikes: Vec<f64>,
    lot: u32,
    legs: Vec<StrategyLeg>,
    placeholders: Vec<f64>,
}

impl<'s, 'a> OptionLegs<'s, 'a> {
    fn new(
        synth: &'s StrategySynthesizer<'a>,
        symbol: &'s str,
        chain: &'s OptionChainAnalysis,
    ) -> Result<Self, SynthesisError> {
        let strikes = chain.ledger.strikes();
        if strikes.is_empty() {
            return Err(SynthesisError::EmptyStrikeLadder {
                symbol: symbol.to_string(),
            });
        }
        Ok(Self {
            synth,
            symbol,
            ledger: &chain.ledger,
            strikes,
            lot: synth.lot_size(symbol),
            legs: Vec::new(),
            placeholders: Vec::new(),
        })
    }

    fn strike(&self, target: f64, offset: usize, option_type: OptionType) -> Result<f64, SynthesisError> {
        select_strike(&self.strikes, target, offset, option_type).ok_or_else(|| {
            SynthesisError::EmptyStrikeLadder {
                symbol: self.symbol.to_string(),
            }
        })
    }

    /// Add a leg at `strike` and return its premium.
    fn push(&mut self, action: LegAction, option_type: OptionType, strike: f64) -> Result<f64, SynthesisError> {
        let row = self
            .ledger
            .get(strike)
            .ok_or_else(|| SynthesisError::EmptyStrikeLadder {
                symbol: self.symbol.to_string(),
            })?;
        let price = self
            .synth
            .leg_premium(self.symbol, row, option_type, &mut self.placeholders)?;
        self.legs.push(StrategyLeg {
            action,
            instrument: Instrument::Option { option_type, strike },
            price,
            quantity: self.lot,
        });
        Ok(price)
    }
}

// =============================================================================
// Debit spreads
// =============================================================================

pub fn bear_put_spread(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    let chain = require_chain(ctx)?;
    let spot = ctx.reference_price();
    let offset = synth.params().spread_offset;
    let mut book = OptionLegs::new(synth, &ctx.signal.symbol, chain)?;

    let long_k = book.strike(spot, 0, OptionType::Put)?;
    let short_k = book.strike(spot, offset, OptionType::Put)?;
    let long_p = book.push(LegAction::Buy, OptionType::Put, long_k)?;
    let short_p = book.push(LegAction::Sell, OptionType::Put, short_k)?;

    let debit = long_p - short_p;
    let width = long_k - short_k;
    let lot = f64::from(book.lot);

    notes.push(format!(
        "Fresh shorts with PCR {:.2}: buy {long_k} PE / sell {short_k} PE",
        chain.pcr_oi
    ));

    Ok(StrategyPlan {
        kind: StrategyKind::BearPutSpread,
        name: StrategyKind::BearPutSpread.name().to_string(),
        legs: book.legs,
        net_premium: -debit,
        premium_flow: flow_of(-debit),
        max_profit: (width - debit) * lot,
        max_loss: Some(debit * lot),
        breakevens: vec![long_k - debit],
        risk_reward: risk_reward_ratio(width - debit, debit),
        target: Some(short_k),
        stop_loss: None,
        placeholder_premiums: book.placeholders,
    })
}

pub fn bull_call_spread(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    let chain = require_chain(ctx)?;
    let spot = ctx.reference_price();
    let offset = synth.params().spread_offset;
    let mut book = OptionLegs::new(synth, &ctx.signal.symbol, chain)?;

    let long_k = book.strike(spot, 0, OptionType::Call)?;
    let short_k = book.strike(spot, offset, OptionType::Call)?;
    let long_p = book.push(LegAction::Buy, OptionType::Call, long_k)?;
    let short_p = book.push(LegAction::Sell, OptionType::Call, short_k)?;

    let debit = long_p - short_p;
    let width = short_k - long_k;
    let lot = f64::from(book.lot);

    notes.push(format!(
        "Fresh longs with put writers in control (PCR {:.2}): buy {long_k} CE / sell {short_k} CE",
        chain.pcr_oi
    ));

    Ok(StrategyPlan {
        kind: StrategyKind::BullCallSpread,
        name: StrategyKind::BullCallSpread.name().to_string(),
        legs: book.legs,
        net_premium: -debit,
        premium_flow: flow_of(-debit),
        max_profit: (width - debit) * lot,
        max_loss: Some(debit * lot),
        breakevens: vec![long_k + debit],
        risk_reward: risk_reward_ratio(width - debit, debit),
        target: Some(short_k),
        stop_loss: None,
        placeholder_premiums: book.placeholders,
    })
}

// =============================================================================
// Iron condor
// =============================================================================

pub fn iron_condor(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    let chain = require_chain(ctx)?;
    let spot = ctx.reference_price();
    let params = synth.params();
    let mut book = OptionLegs::new(synth, &ctx.signal.symbol, chain)?;

    let long_put_k = book.strike(spot, params.condor_wing_offset, OptionType::Put)?;
    let short_put_k = book.strike(spot, params.condor_short_offset, OptionType::Put)?;
    let short_call_k = book.strike(spot, params.condor_short_offset, OptionType::Call)?;
    let long_call_k = book.strike(spot, params.condor_wing_offset, OptionType::Call)?;

    let long_put_p = book.push(LegAction::Buy, OptionType::Put, long_put_k)?;
    let short_put_p = book.push(LegAction::Sell, OptionType::Put, short_put_k)?;
    let short_call_p = book.push(LegAction::Sell, OptionType::Call, short_call_k)?;
    let long_call_p = book.push(LegAction::Buy, OptionType::Call, long_call_k)?;

    let credit = short_put_p + short_call_p - long_put_p - long_call_p;
    let width = (short_put_k - long_put_k).max(long_call_k - short_call_k);
    let lot = f64::from(book.lot);

    notes.push(format!(
        "Range-bound with balanced PCR {:.2}: sell {short_put_k} PE / {short_call_k} CE, wings {long_put_k} / {long_call_k}",
        chain.pcr_oi
    ));

    Ok(StrategyPlan {
        kind: StrategyKind::IronCondor,
        name: StrategyKind::IronCondor.name().to_string(),
        legs: book.legs,
        net_premium: credit,
        premium_flow: flow_of(credit),
        max_profit: credit * lot,
        max_loss: Some((width - credit) * lot),
        breakevens: vec![short_put_k - credit, short_call_k + credit],
        risk_reward: risk_reward_ratio(credit, width - credit),
        target: None,
        stop_loss: None,
        placeholder_premiums: book.placeholders,
    })
}

// =============================================================================
// Directional futures
// =============================================================================

pub fn short_futures(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    notes.push(format!(
        "Heavy-volume short build-up ({:.2}x)",
        ctx.signal.volume_ratio
    ));
    let (target, stop) = futures_levels(synth, ctx, LegAction::Sell, notes);
    Ok(futures_plan(synth, ctx, StrategyKind::ShortFutures, LegAction::Sell, target, stop))
}

pub fn long_futures(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    notes.push(format!(
        "Heavy-volume long build-up ({:.2}x)",
        ctx.signal.volume_ratio
    ));
    let (target, stop) = futures_levels(synth, ctx, LegAction::Buy, notes);
    Ok(futures_plan(synth, ctx, StrategyKind::LongFutures, LegAction::Buy, target, stop))
}

/// Target and stop for a futures position entered at the last close.
///
/// With a chain, a long targets resistance and stops at support (a short
/// the reverse).  Without one, both sit at fixed percentages around the
/// reference price.  Any level that lands on the wrong side of entry is
/// replaced by the percentage level around entry, so the target is always
/// strictly profitable and the stop strictly protective.
fn futures_levels(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    action: LegAction,
    notes: &mut Vec<String>,
) -> (f64, f64) {
    let params = synth.params();
    let entry = ctx.signal.last_close;
    let dir = direction(action);
    let around = |base: f64, pct: f64, sign: f64| base * (1.0 + sign * pct / 100.0);

    let (target, stop) = match (ctx.analysis, action) {
        (Some(chain), LegAction::Buy) => (chain.resistance, chain.support),
        (Some(chain), LegAction::Sell) => (chain.support, chain.resistance),
        (None, _) => {
            let spot = ctx.reference_price();
            (
                around(spot, params.futures_target_pct, dir),
                around(spot, params.futures_stop_pct, -dir),
            )
        }
    };

    let target = if dir * (target - entry) > 0.0 {
        target
    } else {
        let fallback = around(entry, params.futures_target_pct, dir);
        notes.push(format!(
            "Target {target:.2} is not beyond entry {entry:.2}; using {fallback:.2} ({}% from entry)",
            params.futures_target_pct
        ));
        fallback
    };
    let stop = if dir * (entry - stop) > 0.0 {
        stop
    } else {
        let fallback = around(entry, params.futures_stop_pct, -dir);
        notes.push(format!(
            "Stop {stop:.2} does not protect entry {entry:.2}; using {fallback:.2} ({}% from entry)",
            params.futures_stop_pct
        ));
        fallback
    };

    notes.push(format!("Entry {entry:.2}, target {target:.2}, stop {stop:.2}"));
    (target, stop)
}

fn direction(action: LegAction) -> f64 {
    match action {
        LegAction::Buy => 1.0,
        LegAction::Sell => -1.0,
    }
}

fn futures_plan(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    kind: StrategyKind,
    action: LegAction,
    target: f64,
    stop: f64,
) -> StrategyPlan {
    let entry = ctx.signal.last_close;
    let dir = direction(action);
    // Non-negative once `futures_levels` has placed both levels.
    let reward = (dir * (target - entry)).max(0.0);
    let risk = (dir * (entry - stop)).max(0.0);
    let lot_size = synth.lot_size(&ctx.signal.symbol);
    let lot = f64::from(lot_size);
    StrategyPlan {
        kind,
        name: kind.name().to_string(),
        legs: vec![StrategyLeg {
            action,
            instrument: Instrument::Futures,
            price: entry,
            quantity: lot_size,
        }],
        net_premium: 0.0,
        premium_flow: PremiumFlow::None,
        max_profit: reward * lot,
        max_loss: Some(risk * lot),
        breakevens: vec![entry],
        risk_reward: risk_reward_ratio(reward, risk),
        target: Some(target),
        stop_loss: Some(stop),
        placeholder_premiums: Vec::new(),
    }
}

// =============================================================================
// Naked credit legs
// =============================================================================

pub fn sell_call(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    let chain = require_chain(ctx)?;
    let mut book = OptionLegs::new(synth, &ctx.signal.symbol, chain)?;
    let strike = book.strike(chain.resistance, synth.params().credit_offset, OptionType::Call)?;
    let premium = book.push(LegAction::Sell, OptionType::Call, strike)?;

    notes.push(format!(
        "Short covering on thin volume ({:.2}x): write {strike} CE at call OI wall",
        ctx.signal.volume_ratio
    ));

    Ok(naked_credit_plan(StrategyKind::SellCall, book, premium, strike + premium))
}

pub fn sell_put(
    synth: &StrategySynthesizer<'_>,
    ctx: &SymbolContext<'_>,
    notes: &mut Vec<String>,
) -> Result<StrategyPlan, SynthesisError> {
    let chain = require_chain(ctx)?;
    let mut book = OptionLegs::new(synth, &ctx.signal.symbol, chain)?;
    let strike = book.strike(chain.support, synth.params().credit_offset, OptionType::Put)?;
    let premium = book.push(LegAction::Sell, OptionType::Put, strike)?;

    notes.push(format!(
        "Long unwinding on thin volume ({:.2}x): write {strike} PE at put OI wall",
        ctx.signal.volume_ratio
    ));

    Ok(naked_credit_plan(StrategyKind::SellPut, book, premium, strike - premium))
}

fn naked_credit_plan(kind: StrategyKind, book: OptionLegs<'_, '_>, premium: f64, breakeven: f64) -> StrategyPlan {
    StrategyPlan {
        kind,
        name: kind.name().to_string(),
        max_profit: premium * f64::from(book.lot),
        legs: book.legs,
        net_premium: premium,
        premium_flow: PremiumFlow::Credit,
        max_loss: None,
        breakevens: vec![breakeven],
        risk_reward: UNDEFINED_RISK_LABEL.to_string(),
        target: None,
        stop_loss: None,
        placeholder_premiums: book.placeholders,
    }
}

fn flow_of(net_premium: f64) -> PremiumFlow {
    if net_premium > 0.0 {
        PremiumFlow::Credit
    } else if net_premium < 0.0 {
        PremiumFlow::Debit
    } else {
        PremiumFlow::None
    }
}
