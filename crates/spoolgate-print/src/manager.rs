// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue manager: one job queue per printer, plus the observer that bridges
// health monitor transitions into queue state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use spoolgate_core::config::QueueConfig;
use spoolgate_core::error::Result;
use spoolgate_core::types::{PrintJob, PrintResult, PrinterStatus};

use crate::adapter::{PrintHandler, PrinterAdapter};
use crate::health::StatusObserver;
use crate::queue::PrintQueue;

/// Delivers queue jobs through a printer adapter.
pub struct AdapterHandler(Arc<dyn PrinterAdapter>);

impl AdapterHandler {
    pub fn new(adapter: Arc<dyn PrinterAdapter>) -> Self {
        Self(adapter)
    }
}

#[async_trait]
impl PrintHandler for AdapterHandler {
    async fn handle(&self, job: PrintJob) -> Result<PrintResult> {
        self.0.print(&job).await
    }
}

/// Creates and tracks one [`PrintQueue`] per printer id.
pub struct QueueManager {
    queues: Mutex<HashMap<String, PrintQueue>>,
    config: QueueConfig,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Return the queue for a printer, creating it with the given handler on
    /// first use. An existing queue keeps its original handler.
    pub fn get_or_create(
        &self,
        printer_id: &str,
        handler: Arc<dyn PrintHandler>,
    ) -> PrintQueue {
        self.queues
            .lock()
            .expect("queue manager lock poisoned")
            .entry(printer_id.to_string())
            .or_insert_with(|| PrintQueue::new(printer_id, handler, self.config.clone()))
            .clone()
    }

    pub fn get(&self, printer_id: &str) -> Option<PrintQueue> {
        self.queues
            .lock()
            .expect("queue manager lock poisoned")
            .get(printer_id)
            .cloned()
    }

    pub fn all(&self) -> Vec<PrintQueue> {
        self.queues
            .lock()
            .expect("queue manager lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

/// Forwards printer status transitions to the matching queue.
///
/// Back online (OFFLINE to READY/BUSY) promotes the offline hold and resumes
/// draining; going OFFLINE flags the queue so callers hold new work.
pub struct QueueStatusBridge {
    queues: Arc<QueueManager>,
}

impl QueueStatusBridge {
    pub fn new(queues: Arc<QueueManager>) -> Self {
        Self { queues }
    }
}

#[async_trait]
impl StatusObserver for QueueStatusBridge {
    async fn on_status_change(
        &self,
        printer_id: &str,
        previous: Option<PrinterStatus>,
        current: PrinterStatus,
    ) -> Result<()> {
        if previous == Some(PrinterStatus::Offline) && current.is_available() {
            if let Some(queue) = self.queues.get(printer_id) {
                info!(printer = %printer_id, "printer back online, resuming queue");
                queue.on_printer_online().await;
            }
        } else if current == PrinterStatus::Offline {
            if let Some(queue) = self.queues.get(printer_id) {
                queue.set_printer_offline();
            }
        }
        Ok(())
    }
}
