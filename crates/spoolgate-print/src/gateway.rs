// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway context: the one object the embedding process constructs at
// startup and hands to its HTTP handlers. Owns the printer registry, the
// queue manager, the intent router, and the health monitor, wired together
// through the queue status bridge.

use std::sync::Arc;

use tracing::info;

use spoolgate_core::config::GatewayConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::{PrintJob, PrinterStatus};

use crate::adapter::PrinterAdapter;
use crate::health::HealthMonitor;
use crate::manager::{AdapterHandler, QueueManager, QueueStatusBridge};
use crate::queue::{PrintQueue, QueuedJob};
use crate::registry::PrinterRegistry;
use crate::routing::PrintRouter;

/// Everything a gateway process needs, constructed once and passed around
/// explicitly (no process-wide singletons).
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<PrinterRegistry>,
    queues: Arc<QueueManager>,
    router: PrintRouter,
    monitor: HealthMonitor,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(PrinterRegistry::new());
        let queues = Arc::new(QueueManager::new(config.queue.clone()));
        let bridge = Arc::new(QueueStatusBridge::new(Arc::clone(&queues)));
        let monitor = HealthMonitor::new(
            Arc::clone(&registry),
            Some(bridge),
            config.resilience.health_check_interval,
        );
        let router = PrintRouter::from_config(&config);

        Self {
            config,
            registry,
            queues,
            router,
            monitor,
        }
    }

    pub fn registry(&self) -> &Arc<PrinterRegistry> {
        &self.registry
    }

    pub fn queues(&self) -> &Arc<QueueManager> {
        &self.queues
    }

    pub fn router(&self) -> &PrintRouter {
        &self.router
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Register a printer and create its queue.
    pub fn register_printer(&self, adapter: Arc<dyn PrinterAdapter>) -> PrintQueue {
        let printer_id = adapter.id().to_string();
        self.registry.register(Arc::clone(&adapter));
        self.queues
            .get_or_create(&printer_id, Arc::new(AdapterHandler::new(adapter)))
    }

    /// Begin health monitoring.
    pub fn start(&self) {
        info!(printers = self.registry.list_all().len(), "gateway starting");
        self.monitor.start();
    }

    /// Stop health monitoring; in-flight queue drains are left to finish.
    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        info!("gateway stopped");
    }

    /// Admit a job for its target printer.
    ///
    /// Validates the job against the adapter, probes the printer, and either
    /// queues it for immediate delivery or, when the printer is offline and
    /// offline holding is enabled, holds it with an expiry.
    pub async fn submit(&self, job: PrintJob) -> Result<QueuedJob> {
        let adapter = self
            .registry
            .get(&job.printer_id)
            .ok_or_else(|| SpoolgateError::PrinterNotFound(job.printer_id.clone()))?;

        adapter
            .validate_job(&job)
            .map_err(SpoolgateError::InvalidJob)?;

        let queue = self.queues.get_or_create(
            &job.printer_id,
            Arc::new(AdapterHandler::new(Arc::clone(&adapter))),
        );

        match adapter.get_status().await? {
            PrinterStatus::Offline => {
                if !self.config.resilience.offline_queue_enabled {
                    return Err(SpoolgateError::PrinterUnavailable {
                        printer: job.printer_id.clone(),
                        status: PrinterStatus::Offline.to_string(),
                    });
                }
                queue.set_printer_offline();
                queue.add_offline(job).await
            }
            PrinterStatus::Error => Err(SpoolgateError::PrinterUnavailable {
                printer: job.printer_id.clone(),
                status: PrinterStatus::Error.to_string(),
            }),
            PrinterStatus::Ready | PrinterStatus::Busy => queue.add(job).await,
        }
    }
}
