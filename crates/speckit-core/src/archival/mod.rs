//! Archival Lifecycle
//!
//! Ages out memories that have not been touched for a configured number of
//! days. `constitutional` and `critical` tiers are never candidates,
//! regardless of age. The background scan runs on a timer and honors a stop
//! flag between iterations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::errors::{ErrorCode, MemoryError, Result};
use crate::storage::{ArchivalState, MemoryRecord, MemoryStore};

// ============================================================================
// CONFIG AND TYPES
// ============================================================================

/// What to do with an archival candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivalAction {
    /// Set is_archived = 1 and stamp archived_at
    Mark,
    /// Set is_archived = 2 and stamp archived_at
    SoftDelete,
    /// No DB mutation; the candidate is only logged and counted
    LogOnly,
}

/// Archival tuning
#[derive(Debug, Clone)]
pub struct ArchivalConfig {
    /// Inactivity threshold in days
    pub days_threshold: i64,
    /// Action applied by scans
    pub action: ArchivalAction,
    /// Background scan period in ms
    pub scan_interval_ms: u64,
    /// Candidates processed per scan
    pub scan_batch_limit: usize,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            days_threshold: 90,
            action: ArchivalAction::Mark,
            scan_interval_ms: 3_600_000,
            scan_batch_limit: 500,
        }
    }
}

/// Counters across scans; reset-able
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchivalStats {
    pub scans_completed: u64,
    pub candidates_seen: u64,
    pub archived: u64,
    pub failed: u64,
    pub last_scan_at: Option<chrono::DateTime<Utc>>,
}

/// Result of one full scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub scanned: usize,
    pub archived: usize,
    pub failed: usize,
}

/// Result of archiving a batch of explicit ids
#[derive(Debug, Clone, Serialize)]
pub struct BatchArchiveResult {
    pub archived: usize,
    pub failed: usize,
}

/// Verdict for one memory
#[derive(Debug, Clone, Serialize)]
pub struct ArchivalStatus {
    pub should_archive: bool,
    pub reason: String,
}

/// Outcome of a background-job start request
#[derive(Debug, Clone, Serialize)]
pub struct JobStartResult {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// MANAGER
// ============================================================================

/// Age-based archival over the store
pub struct ArchivalManager {
    store: Arc<MemoryStore>,
    config: ArchivalConfig,
    stats: Mutex<ArchivalStats>,
    job: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    stop: Arc<Notify>,
}

impl ArchivalManager {
    /// Create the manager and make sure the schema carries the archival
    /// columns (repair path for stores created by older builds).
    pub fn init(store: Arc<MemoryStore>, config: ArchivalConfig) -> Result<Self> {
        store.ensure_archival_columns()?;
        Ok(Self {
            store,
            config,
            stats: Mutex::new(ArchivalStats::default()),
            job: Mutex::new(None),
            running: AtomicBool::new(false),
            stop: Arc::new(Notify::new()),
        })
    }

    pub fn config(&self) -> &ArchivalConfig {
        &self.config
    }

    fn cutoff(&self) -> chrono::DateTime<Utc> {
        Utc::now() - Duration::days(self.config.days_threshold)
    }

    // ========================================================================
    // Candidates and verdicts
    // ========================================================================

    /// Oldest unprotected, still-active memories past the age threshold
    pub fn get_archival_candidates(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.store.archival_candidates(self.cutoff(), limit)
    }

    /// Why a specific memory would or would not be archived
    pub fn check_memory_archival_status(&self, id: i64) -> Result<ArchivalStatus> {
        let Some(record) = self.store.get_memory(id)? else {
            return Ok(ArchivalStatus {
                should_archive: false,
                reason: "Memory not found".to_string(),
            });
        };

        if record.importance_tier.is_protected() {
            return Ok(ArchivalStatus {
                should_archive: false,
                reason: "Protected tier".to_string(),
            });
        }

        if record.is_archived != ArchivalState::Active {
            return Ok(ArchivalStatus {
                should_archive: false,
                reason: "Already archived".to_string(),
            });
        }

        let idle_days = (Utc::now() - record.last_accessed).num_days();
        if idle_days >= self.config.days_threshold {
            Ok(ArchivalStatus {
                should_archive: true,
                reason: format!(
                    "Inactive for {idle_days} days (threshold {})",
                    self.config.days_threshold
                ),
            })
        } else {
            Ok(ArchivalStatus {
                should_archive: false,
                reason: format!(
                    "Accessed {idle_days} days ago, within threshold {}",
                    self.config.days_threshold
                ),
            })
        }
    }

    // ========================================================================
    // Archive / unarchive
    // ========================================================================

    /// Apply the given action to one memory
    pub fn archive_memory(&self, id: i64, action: ArchivalAction) -> Result<()> {
        let record = self.store.get_memory(id)?.ok_or_else(|| {
            MemoryError::new(ErrorCode::MemoryNotFound, format!("memory {id} not found"))
        })?;

        match action {
            ArchivalAction::Mark => {
                self.store
                    .set_archival_state(id, ArchivalState::Archived, Some(Utc::now()))?;
            }
            ArchivalAction::SoftDelete => {
                self.store
                    .set_archival_state(id, ArchivalState::SoftDeleted, Some(Utc::now()))?;
            }
            ArchivalAction::LogOnly => {
                tracing::info!(
                    memory_id = id,
                    file_path = %record.file_path,
                    "archival candidate (log_only, no mutation)"
                );
            }
        }
        Ok(())
    }

    /// Return a memory to active; no other field changes
    pub fn unarchive_memory(&self, id: i64) -> Result<bool> {
        self.store.unarchive(id)
    }

    /// Archive explicit ids; failures are counted, not propagated
    pub fn archive_batch(&self, ids: &[i64], action: ArchivalAction) -> Result<BatchArchiveResult> {
        let mut archived = 0;
        let mut failed = 0;
        for id in ids {
            match self.archive_memory(*id, action) {
                Ok(()) => archived += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(memory_id = id, error = %e, "batch archive failure");
                }
            }
        }
        Ok(BatchArchiveResult { archived, failed })
    }

    /// One full candidate scan with the configured action
    pub fn run_archival_scan(&self) -> Result<ScanResult> {
        let candidates = self.get_archival_candidates(self.config.scan_batch_limit)?;
        let scanned = candidates.len();
        let mut archived = 0;
        let mut failed = 0;

        for record in candidates {
            match self.archive_memory(record.id, self.config.action) {
                Ok(()) => archived += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(memory_id = record.id, error = %e, "scan archive failure");
                }
            }
        }

        let mut stats = self.stats.lock().expect("archival stats lock");
        stats.scans_completed += 1;
        stats.candidates_seen += scanned as u64;
        stats.archived += archived as u64;
        stats.failed += failed as u64;
        stats.last_scan_at = Some(Utc::now());

        Ok(ScanResult {
            scanned,
            archived,
            failed,
        })
    }

    // ========================================================================
    // Background job
    // ========================================================================

    /// Start the periodic scan task. Re-entry reports "Already running".
    pub fn start_background_job(self: &Arc<Self>) -> JobStartResult {
        if self.running.swap(true, Ordering::SeqCst) {
            return JobStartResult {
                started: false,
                interval_ms: None,
                reason: Some("Already running".to_string()),
            };
        }

        let manager = Arc::clone(self);
        let interval = std::time::Duration::from_millis(self.config.scan_interval_ms);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = manager.stop.notified() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !manager.running.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = manager.run_archival_scan() {
                            tracing::warn!(error = %e, "background archival scan failed");
                        }
                    }
                }
            }
        });
        *self.job.lock().expect("job lock") = Some(handle);

        JobStartResult {
            started: true,
            interval_ms: Some(self.config.scan_interval_ms),
            reason: None,
        }
    }

    /// Ask the loop to exit at its next check
    pub fn stop_background_job(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.notify_waiters();
        if let Some(handle) = self.job.lock().expect("job lock").take() {
            drop(handle);
        }
    }

    pub fn is_background_job_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the job and clear stats
    pub fn cleanup(&self) {
        self.stop_background_job();
        self.reset_stats();
    }

    // ========================================================================
    // Stats
    // ========================================================================

    pub fn get_stats(&self) -> ArchivalStats {
        self.stats.lock().expect("archival stats lock").clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().expect("archival stats lock") = ArchivalStats::default();
    }
}

// ============================================================================
// TESTS
// ============================================================================
