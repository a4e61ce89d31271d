// =============================================================================
// Indicators Module
// =============================================================================
//
// Pure, side-effect-free numeric helpers for the open interest classifier:
// guarded percentage change and the trailing volume mean.

pub mod roc;
