// =============================================================================
// Signals Module
// =============================================================================
//
// Conviction scoring: bucketed evidence from futures positioning and option
// chain alignment, aggregated into a single 0-10 score.

pub mod conviction;

pub use conviction::{ConvictionScore, ConvictionScorer};
