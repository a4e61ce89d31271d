// =============================================================================
// Strike Selection
// =============================================================================
//
// Find the listed strike nearest a target price, then step `offset` strikes
// further out of the money: up the ladder for calls, down for puts.  The
// index clamps at both ends of the ladder.

use crate::types::OptionType;

/// Index of the strike nearest `target` in an ascending ladder.  Ties go to
/// the lower strike.
pub fn nearest_index(strikes: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &strike) in strikes.iter().enumerate() {
        let distance = (strike - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Strike `offset` steps out of the money from the one nearest `target`.
pub fn select_strike(strikes: &[f64], target: f64, offset: usize, option_type: OptionType) -> Option<f64> {
    let idx = nearest_index(strikes, target)?;
    let last = strikes.len() - 1;
    let stepped = match option_type {
        OptionType::Call => idx.saturating_add(offset).min(last),
        OptionType::Put => idx.saturating_sub(offset),
    };
    Some(strikes[stepped])
}
