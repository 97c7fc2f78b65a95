//! Progress tracking for continuous indexing.
//!
//! `SyncProgressTracker` counts the catch-up passes the controller issues and how they end, and
//! remembers the highest block announced. It logs a summary at regular block intervals.

use chrono::{DateTime, Utc};
use tracing::info;

/// Blocks between periodic progress logs.
const LOG_INTERVAL_BLOCKS: u64 = 100;

/// Service for tracking indexing progress
#[derive(Debug, Clone, Default)]
pub struct SyncProgressTracker {
    /// Highest block number announced
    highest_block_seen: Option<u64>,
    passes_requested: usize,
    passes_completed: usize,
    passes_failed: usize,
    passes_skipped: usize,
    /// When the last pass completed
    last_completed_at: Option<DateTime<Utc>>,
    /// Block at which we last logged progress
    last_logged_block: u64,
}

impl SyncProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block(&mut self, number: u64) {
        self.highest_block_seen = Some(self.highest_block_seen.map_or(number, |h| h.max(number)));
    }

    pub fn record_requested(&mut self) {
        self.passes_requested += 1;
    }

    pub fn record_completed(&mut self) {
        self.passes_completed += 1;
        self.last_completed_at = Some(Utc::now());
    }

    pub fn record_failed(&mut self) {
        self.passes_failed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.passes_skipped += 1;
    }

    /// Number of passes issued that have not resolved yet
    pub fn in_flight(&self) -> usize {
        self.passes_requested
            .saturating_sub(self.passes_completed + self.passes_failed)
    }

    /// Log progress every `LOG_INTERVAL_BLOCKS` blocks or when forced
    pub fn log_progress(&mut self, force: bool) {
        let Some(highest) = self.highest_block_seen else {
            return;
        };
        let blocks_since_last_log = highest.saturating_sub(self.last_logged_block);
        if force || blocks_since_last_log >= LOG_INTERVAL_BLOCKS {
            info!("Indexing progress: {}", self.get_stats().summary());
            self.last_logged_block = highest;
        }
    }

    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            highest_block_seen: self.highest_block_seen,
            passes_requested: self.passes_requested,
            passes_completed: self.passes_completed,
            passes_failed: self.passes_failed,
            passes_skipped: self.passes_skipped,
            in_flight: self.in_flight(),
            last_completed_at: self.last_completed_at,
        }
    }
}

/// Snapshot of indexing progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub highest_block_seen: Option<u64>,
    pub passes_requested: usize,
    pub passes_completed: usize,
    pub passes_failed: usize,
    pub passes_skipped: usize,
    pub in_flight: usize,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let head = self
            .highest_block_seen
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "head {}, {} passes requested ({} completed, {} failed, {} in flight), {} skipped",
            head,
            self.passes_requested,
            self.passes_completed,
            self.passes_failed,
            self.in_flight,
            self.passes_skipped
        )
    }
}
