// =============================================================================
// Diagnostics — Auditable record of every degradation during a scan
// =============================================================================
//
// The pipeline never aborts.  Whenever a record is skipped, a symbol is
// dropped, or a recommendation is withheld or weakened, a `Diagnostic` is
// appended to the scan output so the presentation layer can surface it.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// Structurally invalid input record, skipped.
    InvalidRecord,
    /// Fewer than two sessions of futures history; symbol dropped.
    InsufficientHistory,
    /// Futures dates for a symbol are not strictly ascending.
    NonChronological,
    /// Symbol missing from the lot size table.
    LotSizeUnresolved,
    /// A leg was priced with the missing-premium placeholder.
    PlaceholderPremium,
    /// Strategy construction failed; recommendation withheld.
    SynthesisFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::InsufficientHistory => Severity::Info,
            Self::InvalidRecord
            | Self::NonChronological
            | Self::LotSizeUnresolved
            | Self::PlaceholderPremium => Severity::Warning,
            Self::SynthesisFailed => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Absent for records too malformed to carry a symbol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, symbol: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            symbol: symbol.filter(|s| !s.is_empty()).map(str::to_string),
            message: message.into(),
        }
    }

    pub fn for_symbol(kind: DiagnosticKind, symbol: &str, message: impl Into<String>) -> Self {
        Self::new(kind, Some(symbol), message)
    }
}

/// Ordered collection of diagnostics for one scan.  Each push is also logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        let symbol = diagnostic.symbol.as_deref().unwrap_or("-");
        match diagnostic.severity {
            Severity::Info => info!(
                kind = ?diagnostic.kind,
                symbol,
                "{}",
                diagnostic.message
            ),
            Severity::Warning | Severity::Error => warn!(
                kind = ?diagnostic.kind,
                severity = ?diagnostic.severity,
                symbol,
                "{}",
                diagnostic.message
            ),
        }
        self.entries.push(diagnostic);
    }

    /// Append entries that were already logged when first pushed.
    pub fn extend(&mut self, later: Diagnostics) {
        self.entries.extend(later.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    #[cfg(test)]
    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries
            .iter()
            .filter(move |d| d.symbol.as_deref() == Some(symbol))
    }
}
