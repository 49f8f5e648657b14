// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background printer health monitor.
//
// Polls every registered adapter on a fixed interval, detects status
// transitions between consecutive polls, and notifies a registered observer.
// The observer bridges transitions to the per-printer queues (offline hold
// and promotion) without the HTTP layer having to poll anything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use spoolgate_core::error::Result;
use spoolgate_core::types::PrinterStatus;

use crate::registry::PrinterRegistry;

/// Narrow interface for status-transition consumers.
///
/// Invoked at most once per detected transition with the previous status
/// (`None` on first observation) and the new one. Errors are logged by the
/// monitor and never propagate; the new status is committed regardless.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    async fn on_status_change(
        &self,
        printer_id: &str,
        previous: Option<PrinterStatus>,
        current: PrinterStatus,
    ) -> Result<()>;
}

struct MonitorShared {
    registry: Arc<PrinterRegistry>,
    observer: Option<Arc<dyn StatusObserver>>,
    last_status: StdMutex<HashMap<String, PrinterStatus>>,
}

/// Periodic poller over all registered printers.
pub struct HealthMonitor {
    shared: Arc<MonitorShared>,
    interval: Duration,
    running: Arc<AtomicBool>,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the poll loop.
    task_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<PrinterRegistry>,
        observer: Option<Arc<dyn StatusObserver>>,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                registry,
                observer,
                last_status: StdMutex::new(HashMap::new()),
            }),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: StdMutex::new(None),
        }
    }

    /// Start periodic polling. The first poll runs immediately, not after
    /// the first interval. Calling `start` while running is a logged no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("health monitor already running");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown_signal);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            check_all_printers(&shared).await;

            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        check_all_printers(&shared).await;
                    }
                }
            }
        });

        *self
            .task_handle
            .lock()
            .expect("health monitor task lock poisoned") = Some(handle);
        info!(interval_secs = interval.as_secs_f64(), "health monitor started");
    }

    /// Stop polling and wait for any in-flight poll iteration to unwind.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown_signal.notify_one();

        let handle = self
            .task_handle
            .lock()
            .expect("health monitor task lock poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "health monitor task join failed");
            }
        }
        info!("health monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Force an immediate poll of every registered printer, independent of
    /// the periodic loop.
    pub async fn check_now(&self) -> HashMap<String, PrinterStatus> {
        check_all_printers(&self.shared).await
    }

    /// The last observed status for a printer, or `None` if never probed.
    pub fn last_status(&self, printer_id: &str) -> Option<PrinterStatus> {
        self.shared
            .last_status
            .lock()
            .expect("health monitor status lock poisoned")
            .get(printer_id)
            .copied()
    }
}

/// One poll cycle: probe every printer, detect transitions, commit results.
///
/// A probe failure leaves the recorded status untouched so one flaky probe
/// cannot manufacture a spurious transition.
async fn check_all_printers(shared: &MonitorShared) -> HashMap<String, PrinterStatus> {
    let mut current_statuses = HashMap::new();

    for printer in shared.registry.list_all() {
        let printer_id = printer.id().to_string();
        match printer.get_status().await {
            Ok(status) => {
                current_statuses.insert(printer_id.clone(), status);

                let previous = shared
                    .last_status
                    .lock()
                    .expect("health monitor status lock poisoned")
                    .get(&printer_id)
                    .copied();

                if previous != Some(status) {
                    handle_status_change(shared, &printer_id, previous, status).await;
                }

                shared
                    .last_status
                    .lock()
                    .expect("health monitor status lock poisoned")
                    .insert(printer_id, status);
            }
            Err(e) => {
                error!(printer = %printer_id, error = %e, "status probe failed");
            }
        }
    }

    current_statuses
}

async fn handle_status_change(
    shared: &MonitorShared,
    printer_id: &str,
    previous: Option<PrinterStatus>,
    current: PrinterStatus,
) {
    match previous {
        None => info!(printer = %printer_id, status = %current, "initial printer status"),
        Some(prev) => {
            info!(printer = %printer_id, from = %prev, to = %current, "printer status changed");
        }
    }

    // Derived connection events, independent of the observer callback.
    if current == PrinterStatus::Offline {
        info!(event = "device_disconnected", printer = %printer_id, "printer disconnected");
    } else if previous == Some(PrinterStatus::Offline) && current.is_available() {
        info!(event = "device_reconnected", printer = %printer_id, "printer reconnected");
    }

    if let Some(observer) = &shared.observer {
        if let Err(e) = observer.on_status_change(printer_id, previous, current).await {
            error!(printer = %printer_id, error = %e, "status change callback failed");
        }
    } else {
        debug!(printer = %printer_id, "no status observer registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as RecorderMutex;

    use spoolgate_core::error::SpoolgateError;
    use spoolgate_core::types::{PrintJob, PrintResult};

    use crate::adapter::PrinterAdapter;
    use crate::mock::MockPrinter;

    type Transition = (String, Option<PrinterStatus>, PrinterStatus);

    /// Observer that records every transition it sees.
    struct Recorder {
        seen: RecorderMutex<Vec<Transition>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: RecorderMutex::new(Vec::new()),
                fail,
            })
        }

        fn seen(&self) -> Vec<Transition> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusObserver for Recorder {
        async fn on_status_change(
            &self,
            printer_id: &str,
            previous: Option<PrinterStatus>,
            current: PrinterStatus,
        ) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((printer_id.to_string(), previous, current));
            if self.fail {
                return Err(SpoolgateError::StatusCallback("boom".into()));
            }
            Ok(())
        }
    }

    /// Adapter whose probe always errors.
    struct BrokenProbe;

    #[async_trait]
    impl PrinterAdapter for BrokenProbe {
        fn id(&self) -> &str {
            "broken"
        }

        fn name(&self) -> &str {
            "Broken Probe"
        }

        async fn get_status(&self) -> Result<PrinterStatus> {
            Err(SpoolgateError::Usb("probe exploded".into()))
        }

        async fn print(&self, job: &PrintJob) -> Result<PrintResult> {
            Ok(PrintResult::ok(job.id, "ok"))
        }

        fn supported_content_types(&self) -> &[&str] {
            &["image/png"]
        }
    }

    fn registry_with(printer: Arc<MockPrinter>) -> Arc<PrinterRegistry> {
        let registry = Arc::new(PrinterRegistry::new());
        registry.register(printer);
        registry
    }

    #[tokio::test]
    async fn first_poll_reports_initial_transition() {
        let printer = Arc::new(MockPrinter::label("mock"));
        let observer = Recorder::new(false);
        let monitor = HealthMonitor::new(
            registry_with(printer),
            Some(observer.clone()),
            Duration::from_secs(30),
        );

        let statuses = monitor.check_now().await;
        assert_eq!(statuses["mock"], PrinterStatus::Ready);
        assert_eq!(
            observer.seen(),
            vec![("mock".to_string(), None, PrinterStatus::Ready)]
        );
        assert_eq!(monitor.last_status("mock"), Some(PrinterStatus::Ready));
    }

    #[tokio::test]
    async fn transition_fires_callback_once() {
        let printer = Arc::new(MockPrinter::label("mock"));
        let observer = Recorder::new(false);
        let monitor = HealthMonitor::new(
            registry_with(printer.clone()),
            Some(observer.clone()),
            Duration::from_secs(30),
        );

        monitor.check_now().await;
        monitor.check_now().await; // unchanged, no second callback
        printer.set_status(PrinterStatus::Offline);
        monitor.check_now().await;

        let seen = observer.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            (
                "mock".to_string(),
                Some(PrinterStatus::Ready),
                PrinterStatus::Offline
            )
        );
    }

    #[tokio::test]
    async fn callback_failure_still_commits_status() {
        let printer = Arc::new(MockPrinter::label("mock"));
        let observer = Recorder::new(true);
        let monitor = HealthMonitor::new(
            registry_with(printer.clone()),
            Some(observer.clone()),
            Duration::from_secs(30),
        );

        monitor.check_now().await;
        printer.set_status(PrinterStatus::Offline);
        monitor.check_now().await;

        // Status committed despite the failing callback; a repeat poll sees
        // no further transition.
        assert_eq!(monitor.last_status("mock"), Some(PrinterStatus::Offline));
        monitor.check_now().await;
        assert_eq!(observer.seen().len(), 2);
    }

    #[tokio::test]
    async fn probe_failure_preserves_recorded_status() {
        let registry = Arc::new(PrinterRegistry::new());
        let mock = Arc::new(MockPrinter::label("mock"));
        registry.register(mock.clone());
        registry.register(Arc::new(BrokenProbe));

        let monitor = HealthMonitor::new(registry, None, Duration::from_secs(30));
        let statuses = monitor.check_now().await;

        assert_eq!(statuses.len(), 1);
        assert_eq!(monitor.last_status("broken"), None);
        assert_eq!(monitor.last_status("mock"), Some(PrinterStatus::Ready));
    }

    #[tokio::test]
    async fn periodic_loop_observes_changes_and_stops_cleanly() {
        let printer = Arc::new(MockPrinter::label("mock"));
        let observer = Recorder::new(false);
        let monitor = HealthMonitor::new(
            registry_with(printer.clone()),
            Some(observer.clone()),
            Duration::from_millis(10),
        );

        monitor.start();
        monitor.start(); // no-op
        assert!(monitor.is_running());

        printer.set_status(PrinterStatus::Offline);
        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;
        assert!(!monitor.is_running());

        let seen_before = observer.seen().len();
        assert!(seen_before >= 2, "initial + offline transitions expected");

        // No dangling poll after stop returns.
        printer.set_status(PrinterStatus::Ready);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(observer.seen().len(), seen_before);
    }
}
