// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The adapter contract every printer backend satisfies.
//
// Concrete adapters wrap a physical device (USB label printer), a spooler
// (CUPS), or a simulation (mock). The queue and the health monitor only ever
// see this trait.

use async_trait::async_trait;

use spoolgate_core::error::Result;
use spoolgate_core::types::{PrintJob, PrintResult, PrinterStatus};

/// A printer backend.
///
/// `get_status` must be safe to call frequently and must not error for
/// ordinary unavailability: an unreachable device is `Offline`, a broken one
/// is `Error`. `print` may return an error only for exceptional conditions
/// the adapter itself cannot classify into a definitive [`PrintResult`]; the
/// resilience layer classifies and absorbs those where possible.
#[async_trait]
pub trait PrinterAdapter: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Probe the device's current status.
    async fn get_status(&self) -> Result<PrinterStatus>;

    /// Deliver a job to the device.
    async fn print(&self, job: &PrintJob) -> Result<PrintResult>;

    /// Synchronous pre-admission check: content type and emptiness only.
    fn validate_job(&self, job: &PrintJob) -> std::result::Result<(), String> {
        if !self
            .supported_content_types()
            .iter()
            .any(|t| *t == job.content_type)
        {
            return Err(format!("unsupported content type: {}", job.content_type));
        }
        if job.data.is_empty() {
            return Err("no data provided".into());
        }
        Ok(())
    }

    /// MIME types this printer accepts.
    fn supported_content_types(&self) -> &[&str];
}

/// The narrow seam through which a queue delivers jobs.
///
/// Usually backed by an adapter (see `manager::AdapterHandler`), but tests
/// substitute their own implementations to observe and script deliveries.
#[async_trait]
pub trait PrintHandler: Send + Sync {
    async fn handle(&self, job: PrintJob) -> Result<PrintResult>;
}
