// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated printers for development and tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use spoolgate_core::error::Result;
use spoolgate_core::types::{PrintJob, PrintResult, PrinterStatus};

use crate::adapter::PrinterAdapter;

/// A printer that prints to the log.
///
/// Status is settable so tests can script offline/online transitions; the
/// print delay simulates transfer time.
pub struct MockPrinter {
    id: String,
    name: String,
    status: Mutex<PrinterStatus>,
    print_delay: Duration,
    content_types: &'static [&'static str],
}

impl MockPrinter {
    /// A simulated label printer accepting PNG payloads.
    pub fn label(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Mock Label Printer".into(),
            status: Mutex::new(PrinterStatus::Ready),
            print_delay: Duration::from_millis(500),
            content_types: &["image/png"],
        }
    }

    /// A simulated document printer accepting PDF payloads.
    pub fn document(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Mock Document Printer".into(),
            status: Mutex::new(PrinterStatus::Ready),
            print_delay: Duration::from_millis(1000),
            content_types: &["application/pdf"],
        }
    }

    pub fn with_print_delay(mut self, delay: Duration) -> Self {
        self.print_delay = delay;
        self
    }

    /// Script the status the next probes will observe.
    pub fn set_status(&self, status: PrinterStatus) {
        *self.status.lock().expect("mock status lock poisoned") = status;
    }
}

#[async_trait]
impl PrinterAdapter for MockPrinter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_status(&self) -> Result<PrinterStatus> {
        Ok(*self.status.lock().expect("mock status lock poisoned"))
    }

    async fn print(&self, job: &PrintJob) -> Result<PrintResult> {
        let status = *self.status.lock().expect("mock status lock poisoned");
        if status != PrinterStatus::Ready {
            return Ok(PrintResult::failure(
                job.id,
                format!("printer not ready: {status}"),
                "PRINTER_NOT_READY",
            ));
        }

        self.set_status(PrinterStatus::Busy);
        tokio::time::sleep(self.print_delay).await;
        self.set_status(PrinterStatus::Ready);

        info!(
            job_id = %job.id,
            filename = %job.filename,
            bytes = job.data.len(),
            "mock printed job"
        );
        Ok(PrintResult::ok(job.id, "print job completed (mock)"))
    }

    fn supported_content_types(&self) -> &[&str] {
        self.content_types
    }
}
