// =============================================================================
// Options Module
// =============================================================================
//
// Single-day option chain analytics: expiry selection, strike ledger, PCR,
// ATM premium proxy, max pain and OI support/resistance.

pub mod chain_analyzer;

pub use chain_analyzer::{OptionChainAnalysis, OptionChainAnalyzer, StrikeLedger, StrikeRow};
