// =============================================================================
// Futures Intelligence Module
// =============================================================================
//
// Two readings derived from daily futures history:
//
//   1. Open Interest  — price/OI build-up classification with streak and
//                       volume context
//   2. Basis          — futures premium / discount against the option
//                       snapshot's spot price

pub mod basis;
pub mod open_interest;

pub use basis::{BasisDetector, DivergenceSignal};
pub use open_interest::{ClassifiedSignal, OpenInterestClassifier};
