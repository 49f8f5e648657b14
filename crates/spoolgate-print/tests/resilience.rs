// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cross-component scenarios: queue offline hold, health monitor bridging,
// and USB retry/reconnect, wired together the way a gateway process wires
// them.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use spoolgate_core::config::{GatewayConfig, QueueConfig, ResiliencePolicy};
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::{JobId, JobStatus, PrintJob, PrintResult, PrinterStatus};
use spoolgate_print::adapter::PrintHandler;
use spoolgate_print::health::HealthMonitor;
use spoolgate_print::manager::{AdapterHandler, QueueManager, QueueStatusBridge};
use spoolgate_print::mock::MockPrinter;
use spoolgate_print::queue::PrintQueue;
use spoolgate_print::registry::PrinterRegistry;
use spoolgate_print::usb::{UsbPrinter, UsbTransport};
use spoolgate_print::Gateway;

fn fast_queue_config() -> QueueConfig {
    QueueConfig {
        offline_queue_timeout: Duration::from_millis(80),
        sweep_interval: Duration::from_millis(20),
        ..QueueConfig::default()
    }
}

fn test_job(printer_id: &str) -> PrintJob {
    PrintJob::new(printer_id, "tag.png", vec![1, 2, 3], "image/png")
}

async fn wait_for_status(queue: &PrintQueue, id: JobId, status: JobStatus) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if queue.get_job(id).await.map(|e| e.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for job status");
}

/// Handler that counts deliveries and remembers which jobs it saw.
struct CountingHandler {
    calls: AtomicUsize,
    seen: StdMutex<Vec<JobId>>,
}

impl CountingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: StdMutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PrintHandler for CountingHandler {
    async fn handle(&self, job: PrintJob) -> Result<PrintResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(job.id);
        Ok(PrintResult::ok(job.id, "ok"))
    }
}

/// An offline-held job expires once its deadline passes with no online
/// transition, and lands in history as Expired.
#[tokio::test]
async fn offline_job_expires_without_reconnect() {
    let manager = QueueManager::new(fast_queue_config());
    let queue = manager.get_or_create("label", CountingHandler::new());

    queue.set_printer_offline();
    let held = queue.add_offline(test_job("label")).await.unwrap();
    assert!(held.expires_at.unwrap() > chrono::Utc::now());

    wait_for_status(&queue, held.job.id, JobStatus::Expired).await;

    let entry = queue.get_job(held.job.id).await.unwrap();
    assert_eq!(entry.status, JobStatus::Expired);
    assert_eq!(queue.status().await.queued, 0);
    assert_eq!(queue.history(10).await.len(), 1);
}

/// The monitor observes the reconnect transition and the bridge resumes the
/// queue; the held job is delivered exactly once.
#[tokio::test]
async fn monitor_bridges_reconnect_to_queue_drain() {
    let registry = Arc::new(PrinterRegistry::new());
    let printer = Arc::new(MockPrinter::label("label").with_print_delay(Duration::from_millis(1)));
    registry.register(printer.clone());

    let manager = Arc::new(QueueManager::new(fast_queue_config()));
    let handler = CountingHandler::new();
    let queue = manager.get_or_create("label", handler.clone());

    let bridge = Arc::new(QueueStatusBridge::new(Arc::clone(&manager)));
    let monitor = HealthMonitor::new(registry, Some(bridge), Duration::from_secs(30));

    // Printer goes offline; the queue holds the job.
    printer.set_status(PrinterStatus::Offline);
    monitor.check_now().await;
    assert!(!queue.status().await.printer_online);

    let held = queue.add_offline(test_job("label")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);

    // Printer recovers; the next poll promotes and drains.
    printer.set_status(PrinterStatus::Ready);
    monitor.check_now().await;

    wait_for_status(&queue, held.job.id, JobStatus::Completed).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.seen.lock().unwrap().as_slice(), &[held.job.id]);
}

/// Transport that fails the first send with a recoverable error, then
/// succeeds.
struct FlakyTransport {
    sends: AtomicUsize,
    discovers: AtomicUsize,
}

#[async_trait]
impl UsbTransport for FlakyTransport {
    async fn discover(&self) -> Result<Vec<String>> {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["usb://dev0".into()])
    }

    async fn send(&self, _device: &str, _payload: &[u8]) -> Result<()> {
        if self.sends.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(SpoolgateError::Io(std::io::Error::from_raw_os_error(19)));
        }
        Ok(())
    }
}

/// A queue job delivered through the resilient USB adapter survives a
/// transient disconnect: one reconnect, then success.
#[tokio::test]
async fn queued_job_survives_transient_usb_disconnect() {
    let transport = Arc::new(FlakyTransport {
        sends: AtomicUsize::new(0),
        discovers: AtomicUsize::new(0),
    });
    let policy = ResiliencePolicy {
        retry_delay: Duration::from_millis(5),
        ..ResiliencePolicy::default()
    };
    let printer = Arc::new(UsbPrinter::new(
        "usb-label",
        "Label Printer",
        "usb://dev0",
        policy,
        transport.clone(),
    ));

    let manager = QueueManager::new(fast_queue_config());
    let queue = manager.get_or_create("usb-label", Arc::new(AdapterHandler::new(printer.clone())));

    let entry = queue.add(test_job("usb-label")).await.unwrap();
    wait_for_status(&queue, entry.job.id, JobStatus::Completed).await;

    assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    assert_eq!(printer.device_state().reconnect_attempts, 1);

    let done = queue.get_job(entry.job.id).await.unwrap();
    assert!(done.result.unwrap().success);
}

/// Full gateway round trip: submit while offline, recover, watch the job
/// complete through the periodic monitor.
#[tokio::test]
async fn gateway_end_to_end_offline_recovery() {
    let config = GatewayConfig {
        queue: fast_queue_config(),
        resilience: ResiliencePolicy {
            health_check_interval: Duration::from_millis(15),
            ..ResiliencePolicy::default()
        },
        ..GatewayConfig::default()
    };
    let gateway = Gateway::new(config);
    let printer = Arc::new(MockPrinter::label("label").with_print_delay(Duration::from_millis(1)));
    let queue = gateway.register_printer(printer.clone());

    printer.set_status(PrinterStatus::Offline);
    gateway.start();
    // Pin down the first observation before submitting.
    gateway.monitor().check_now().await;

    let entry = gateway.submit(test_job("label")).await.unwrap();
    assert_eq!(entry.status, JobStatus::QueuedOffline);

    printer.set_status(PrinterStatus::Ready);
    wait_for_status(&queue, entry.job.id, JobStatus::Completed).await;

    gateway.shutdown().await;
    assert!(!gateway.monitor().is_running());
}
