// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory per-printer job queue with offline hold.
//
// Jobs drain sequentially in FIFO order, one in flight at a time. While the
// printer is offline, jobs can be held with an expiry deadline instead of
// being thrown at a dead connection; the health monitor promotes them when
// the device returns. Queue state is memory-resident and lost on restart.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use spoolgate_core::config::QueueConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::{JobId, JobStatus, PrintJob, PrintResult};

use crate::adapter::PrintHandler;

/// A queue entry wrapping one admitted job.
///
/// Mutated only by the queue that owns it; callers receive snapshot clones.
/// A `QueuedOffline` entry always carries an expiry; a `Queued` entry never
/// does.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub job: PrintJob,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<PrintResult>,
    pub error: Option<String>,
}

impl QueuedJob {
    fn new(job: PrintJob, status: JobStatus, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            job,
            status,
            queued_at: Utc::now(),
            expires_at,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

/// Point-in-time queue snapshot for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub printer_id: String,
    /// Pending entries (queued plus offline-held), excluding the in-flight job.
    pub queued: usize,
    pub queued_offline: usize,
    pub processing: bool,
    pub current_job: Option<JobId>,
    pub printer_online: bool,
}

struct QueueState {
    pending: VecDeque<QueuedJob>,
    current: Option<QueuedJob>,
    history: VecDeque<QueuedJob>,
    /// Exactly one drain loop may run per queue.
    processing: bool,
    /// Exactly one expiry sweep may run per queue.
    sweeping: bool,
}

struct Shared {
    printer_id: String,
    handler: Arc<dyn PrintHandler>,
    config: QueueConfig,
    printer_online: AtomicBool,
    state: Mutex<QueueState>,
}

/// FIFO job queue for a single printer.
///
/// Cheap to clone; all clones share the same queue state. Delivery is
/// asynchronous: `add` returns as soon as the entry is admitted and a drain
/// task is scheduled.
#[derive(Clone)]
pub struct PrintQueue {
    shared: Arc<Shared>,
}

impl PrintQueue {
    pub fn new(
        printer_id: impl Into<String>,
        handler: Arc<dyn PrintHandler>,
        config: QueueConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                printer_id: printer_id.into(),
                handler,
                config,
                printer_online: AtomicBool::new(true),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    current: None,
                    history: VecDeque::new(),
                    processing: false,
                    sweeping: false,
                }),
            }),
        }
    }

    pub fn printer_id(&self) -> &str {
        &self.shared.printer_id
    }

    /// Admit a job for immediate processing.
    ///
    /// Fails with [`SpoolgateError::QueueFull`] once pending plus in-flight
    /// jobs reach the configured ceiling. Starts the drain loop if it is not
    /// already running.
    pub async fn add(&self, job: PrintJob) -> Result<QueuedJob> {
        let mut state = self.shared.state.lock().await;
        self.check_capacity(&state)?;

        let entry = QueuedJob::new(job, JobStatus::Queued, None);
        info!(
            job_id = %entry.job.id,
            printer = %self.shared.printer_id,
            "job added to queue"
        );
        state.pending.push_back(entry.clone());
        self.spawn_drain_if_idle(&mut state);
        Ok(entry)
    }

    /// Admit a job while the printer is offline.
    ///
    /// The entry is held (not drained) with an expiry deadline of now plus
    /// the configured offline timeout, and the expiry sweep is started if it
    /// is not already running.
    pub async fn add_offline(&self, job: PrintJob) -> Result<QueuedJob> {
        let mut state = self.shared.state.lock().await;
        self.check_capacity(&state)?;

        let expires_at = Utc::now() + self.shared.config.offline_queue_timeout;
        let entry = QueuedJob::new(job, JobStatus::QueuedOffline, Some(expires_at));
        info!(
            job_id = %entry.job.id,
            printer = %self.shared.printer_id,
            expires_at = %expires_at,
            "job held while printer offline"
        );
        state.pending.push_back(entry.clone());

        if !state.sweeping {
            state.sweeping = true;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { sweep_expired(shared).await });
        }
        Ok(entry)
    }

    /// Promote every offline-held entry back to `Queued` and resume draining.
    ///
    /// Idempotent: with no offline entries this is a no-op returning 0.
    /// Promotion keeps each entry at its original queue position.
    pub async fn on_printer_online(&self) -> usize {
        self.shared.printer_online.store(true, Ordering::SeqCst);

        let mut state = self.shared.state.lock().await;
        let mut promoted = 0;
        for entry in state.pending.iter_mut() {
            if entry.status == JobStatus::QueuedOffline {
                entry.status = JobStatus::Queued;
                entry.expires_at = None;
                promoted += 1;
                debug!(job_id = %entry.job.id, "job promoted from offline hold");
            }
        }

        if promoted > 0 {
            info!(
                printer = %self.shared.printer_id,
                promoted,
                "printer online, offline jobs promoted"
            );
        }

        if !state.pending.is_empty() {
            self.spawn_drain_if_idle(&mut state);
        }
        promoted
    }

    /// Record that the printer went offline. Existing entries are untouched;
    /// callers hold new work via [`add_offline`] once they observe OFFLINE.
    pub fn set_printer_offline(&self) {
        self.shared.printer_online.store(false, Ordering::SeqCst);
        info!(printer = %self.shared.printer_id, "printer offline, queue will hold new jobs");
    }

    /// Cancel a pending entry.
    ///
    /// Only `Queued` and `QueuedOffline` entries can be cancelled; an
    /// in-flight or terminal job returns `false`.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let mut state = self.shared.state.lock().await;
        let Some(pos) = state.pending.iter().position(|e| e.job.id == job_id) else {
            return false;
        };
        let Some(mut entry) = state.pending.remove(pos) else {
            return false;
        };
        entry.status = JobStatus::Cancelled;
        entry.completed_at = Some(Utc::now());
        info!(job_id = %job_id, printer = %self.shared.printer_id, "job cancelled");
        push_history(&mut state, &self.shared.config, entry);
        true
    }

    /// Queue counters and the in-flight job id.
    pub async fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock().await;
        let queued_offline = state
            .pending
            .iter()
            .filter(|e| e.status == JobStatus::QueuedOffline)
            .count();
        QueueStatus {
            printer_id: self.shared.printer_id.clone(),
            queued: state.pending.len(),
            queued_offline,
            processing: state.current.is_some(),
            current_job: state.current.as_ref().map(|e| e.job.id),
            printer_online: self.shared.printer_online.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of the in-flight entry followed by all pending entries.
    pub async fn jobs(&self) -> Vec<QueuedJob> {
        let state = self.shared.state.lock().await;
        let mut jobs = Vec::with_capacity(state.pending.len() + 1);
        if let Some(current) = &state.current {
            jobs.push(current.clone());
        }
        jobs.extend(state.pending.iter().cloned());
        jobs
    }

    /// The most recent `limit` terminal entries, oldest first.
    pub async fn history(&self, limit: usize) -> Vec<QueuedJob> {
        let state = self.shared.state.lock().await;
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Look up one entry by id: in-flight first, then pending, then history.
    pub async fn get_job(&self, job_id: JobId) -> Option<QueuedJob> {
        let state = self.shared.state.lock().await;
        if let Some(current) = &state.current {
            if current.job.id == job_id {
                return Some(current.clone());
            }
        }
        if let Some(entry) = state.pending.iter().find(|e| e.job.id == job_id) {
            return Some(entry.clone());
        }
        state
            .history
            .iter()
            .find(|e| e.job.id == job_id)
            .cloned()
    }

    fn check_capacity(&self, state: &QueueState) -> Result<()> {
        let pending = state.pending.len() + usize::from(state.current.is_some());
        if pending >= self.shared.config.max_queue_size {
            return Err(SpoolgateError::QueueFull {
                max: self.shared.config.max_queue_size,
            });
        }
        Ok(())
    }

    /// Start the drain loop unless one is already running. The flag flip and
    /// the spawn happen under the queue lock so concurrent admissions cannot
    /// double-start the loop.
    fn spawn_drain_if_idle(&self, state: &mut QueueState) {
        if !state.processing {
            state.processing = true;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { drain(shared).await });
        }
    }
}

/// Drain loop: deliver `Queued` entries in admission order, one at a time.
///
/// `QueuedOffline` entries are skipped in place, never dequeued. The loop
/// exits once no `Queued` entry remains; a later `add` or promotion starts a
/// fresh one.
async fn drain(shared: Arc<Shared>) {
    loop {
        let mut entry = {
            let mut state = shared.state.lock().await;
            let Some(pos) = state
                .pending
                .iter()
                .position(|e| e.status == JobStatus::Queued)
            else {
                state.processing = false;
                return;
            };
            let Some(mut entry) = state.pending.remove(pos) else {
                state.processing = false;
                return;
            };
            entry.status = JobStatus::Printing;
            entry.started_at = Some(Utc::now());
            state.current = Some(entry.clone());
            entry
        };

        debug!(job_id = %entry.job.id, printer = %shared.printer_id, "processing job");
        let outcome = shared.handler.handle(entry.job.clone()).await;

        let mut state = shared.state.lock().await;
        entry.completed_at = Some(Utc::now());
        match outcome {
            Ok(result) if result.success => {
                entry.status = JobStatus::Completed;
                entry.result = Some(result);
                info!(job_id = %entry.job.id, "job completed");
            }
            Ok(result) => {
                entry.status = JobStatus::Failed;
                entry.error = Some(result.message.clone());
                entry.result = Some(result);
                warn!(
                    job_id = %entry.job.id,
                    error = entry.error.as_deref().unwrap_or_default(),
                    "job failed"
                );
            }
            Err(e) => {
                entry.status = JobStatus::Failed;
                entry.error = Some(e.to_string());
                error!(job_id = %entry.job.id, error = %e, "job failed with error");
            }
        }
        state.current = None;
        push_history(&mut state, &shared.config, entry);
    }
}

/// Expiry sweep: wake on a fixed interval, expire overdue offline entries,
/// and stop once none remain.
async fn sweep_expired(shared: Arc<Shared>) {
    loop {
        tokio::time::sleep(shared.config.sweep_interval).await;

        let mut state = shared.state.lock().await;
        let now = Utc::now();
        let mut i = 0;
        while i < state.pending.len() {
            let overdue = state.pending[i].status == JobStatus::QueuedOffline
                && state.pending[i].expires_at.is_some_and(|t| t < now);
            if !overdue {
                i += 1;
                continue;
            }
            let Some(mut entry) = state.pending.remove(i) else {
                break;
            };
            entry.status = JobStatus::Expired;
            entry.completed_at = Some(now);
            entry.error = Some("job expired while printer offline".into());
            warn!(
                job_id = %entry.job.id,
                printer = %shared.printer_id,
                "offline job expired"
            );
            push_history(&mut state, &shared.config, entry);
        }

        let has_offline = state
            .pending
            .iter()
            .any(|e| e.status == JobStatus::QueuedOffline);
        if !has_offline {
            debug!(printer = %shared.printer_id, "no offline jobs remain, stopping expiry sweep");
            state.sweeping = false;
            return;
        }
    }
}

/// Append to the bounded history ring, evicting oldest entries first.
fn push_history(state: &mut QueueState, config: &QueueConfig, entry: QueuedJob) {
    state.history.push_back(entry);
    while state.history.len() > config.history_limit {
        state.history.pop_front();
    }
}
