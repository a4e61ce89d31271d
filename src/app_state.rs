// =============================================================================
// Central Application State — F&O scanner service
// =============================================================================
//
// Ties the immutable runtime configuration to the most recent scan snapshot.
// Scans are pure batch recomputations; the only mutable state is "which
// snapshot is current".
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - Config behind a plain `Arc`; it never changes after startup.
//   - parking_lot::RwLock for the latest snapshot.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::PipelineOutput;
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// ScanSnapshot
// =============================================================================

/// One completed scan, as served to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    /// Unique identifier for this scan (UUID v4).
    pub id: String,
    /// ISO 8601 timestamp of when the scan finished.
    pub generated_at: String,
    /// State version assigned when the snapshot was stored.
    pub state_version: u64,
    #[serde(flatten)]
    pub output: PipelineOutput,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Incremented every time a new snapshot is stored.
    pub state_version: AtomicU64,

    /// Read-only for the life of the process; the lot size table is
    /// maintained externally.
    pub runtime_config: Arc<RuntimeConfig>,

    pub last_scan: RwLock<Option<Arc<ScanSnapshot>>>,

    /// Instant when the service was started.  Used for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(config),
            last_scan: RwLock::new(None),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version and return the new value.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    /// Handle on the configuration a scan should run against.
    pub fn config_snapshot(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.runtime_config)
    }

    /// Store `output` as the current scan and return the stored snapshot.
    pub fn store_scan(&self, output: PipelineOutput) -> Arc<ScanSnapshot> {
        let state_version = self.increment_version();
        let snapshot = Arc::new(ScanSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            state_version,
            output,
        });

        info!(
            scan_id = %snapshot.id,
            state_version,
            recommendations = snapshot.output.recommendations.len(),
            diagnostics = snapshot.output.diagnostics.len(),
            "scan snapshot stored"
        );

        *self.last_scan.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn latest_scan(&self) -> Option<Arc<ScanSnapshot>> {
        self.last_scan.read().clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
