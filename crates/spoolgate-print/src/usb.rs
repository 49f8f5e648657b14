// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resilient adapter for USB-connected label printers.
//
// Makes a flaky physical connection look, from the queue's perspective, like
// an adapter that either succeeds or fails definitively. Transient
// disconnects are absorbed internally: classified errors trigger a
// re-enumeration and a bounded number of retries before the adapter gives up
// and returns a failure result.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use spoolgate_core::config::ResiliencePolicy;
use spoolgate_core::error::Result;
use spoolgate_core::types::{PrintJob, PrintResult, PrinterStatus, UsbErrorKind};

use crate::adapter::PrinterAdapter;
use crate::retry::classify_usb_error;

/// The vendor backend seam: device enumeration and raw byte delivery.
///
/// Rendering, format conversion, and the actual bus protocol live behind
/// this trait; the resilience logic only needs to enumerate identifiers and
/// push payloads.
#[async_trait]
pub trait UsbTransport: Send + Sync {
    /// Enumerate the identifiers of currently reachable devices.
    async fn discover(&self) -> Result<Vec<String>>;

    /// Deliver a payload to the device with the given identifier.
    async fn send(&self, device: &str, payload: &[u8]) -> Result<()>;
}

/// Connection-state bookkeeping for one USB device.
///
/// Mutated only by the owning adapter; read by status and diagnostics
/// callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceState {
    pub is_connected: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub reconnect_attempts: u32,
}

/// USB label printer adapter with automatic reconnect.
pub struct UsbPrinter {
    id: String,
    name: String,
    /// Device identifier (e.g. "usb://0x04f9:0x2044"). May change at runtime
    /// when the device re-enumerates under a new path.
    device: StdMutex<String>,
    policy: ResiliencePolicy,
    transport: Arc<dyn UsbTransport>,
    state: StdMutex<DeviceState>,
    /// Only one print transfer or reconnect may touch the physical
    /// connection at a time.
    io_lock: Mutex<()>,
}

impl UsbPrinter {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device: impl Into<String>,
        policy: ResiliencePolicy,
        transport: Arc<dyn UsbTransport>,
    ) -> Self {
        let device = device.into();
        let state = DeviceState {
            // Verified on the first status probe.
            is_connected: !device.is_empty(),
            ..DeviceState::default()
        };
        Self {
            id: id.into(),
            name: name.into(),
            device: StdMutex::new(device),
            policy,
            transport,
            state: StdMutex::new(state),
            io_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the connection state for diagnostics endpoints.
    pub fn device_state(&self) -> DeviceState {
        self.state.lock().expect("device state lock poisoned").clone()
    }

    /// The currently configured device identifier.
    pub fn device(&self) -> String {
        self.device.lock().expect("device lock poisoned").clone()
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    fn set_device(&self, device: String) {
        *self.device.lock().expect("device lock poisoned") = device;
    }

    fn with_state(&self, f: impl FnOnce(&mut DeviceState)) {
        f(&mut self.state.lock().expect("device state lock poisoned"));
    }

    async fn print_with_retry(&self, job: &PrintJob) -> Result<PrintResult> {
        let mut last_error = None;

        for attempt in 0..self.policy.max_retries {
            let outcome = {
                let _guard = self.io_lock.lock().await;
                self.do_print(job).await
            };

            match outcome {
                Ok(result) => {
                    if result.success {
                        self.with_state(|s| s.consecutive_failures = 0);
                    }
                    // A returned failure is application-level, not
                    // connection-level: hand it back without retrying.
                    return Ok(result);
                }
                Err(e) => {
                    self.with_state(|s| s.consecutive_failures += 1);

                    if classify_usb_error(&e) == UsbErrorKind::Recoverable {
                        warn!(
                            job_id = %job.id,
                            attempt = attempt + 1,
                            max = self.policy.max_retries,
                            error = %e,
                            "recoverable USB error during print"
                        );
                        self.with_state(|s| s.last_error = Some(e.to_string()));

                        if attempt + 1 < self.policy.max_retries {
                            if self.attempt_reconnect().await {
                                info!(job_id = %job.id, "reconnected, retrying job");
                            }
                            tokio::time::sleep(self.policy.retry_delay).await;
                        }
                        last_error = Some(e);
                    } else {
                        error!(job_id = %job.id, error = %e, "non-recoverable print error");
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        // All attempts exhausted (or aborted on a non-recoverable error).
        self.with_state(|s| s.is_connected = false);
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".into());
        info!(
            event = "device_reconnect_failed",
            printer = %self.id,
            error = %detail,
            "giving up on print delivery"
        );

        Ok(PrintResult::failure(
            job.id,
            format!(
                "print failed after {} attempts: {detail}",
                self.policy.max_retries
            ),
            "USB_ERROR",
        ))
    }

    /// One transfer attempt. Errors propagate to the retry wrapper.
    async fn do_print(&self, job: &PrintJob) -> Result<PrintResult> {
        let device = self.device();
        self.transport.send(&device, &job.data).await?;

        self.with_state(|s| {
            s.is_connected = true;
            s.last_seen = Some(Utc::now());
            s.last_error = None;
        });

        info!(job_id = %job.id, device = %device, "printed job to device");
        Ok(PrintResult::ok(job.id, "print completed"))
    }

    /// Re-enumerate the bus and try to find our device again.
    ///
    /// Returns true if the device was found, either under its configured
    /// identifier or, when exactly one device is present, under a new one
    /// that we adopt.
    async fn attempt_reconnect(&self) -> bool {
        let attempts = {
            let mut state = self.state.lock().expect("device state lock poisoned");
            state.reconnect_attempts += 1;
            state.reconnect_attempts
        };
        let configured = self.device();
        info!(
            event = "device_disconnected",
            printer = %self.id,
            attempt = attempts,
            "attempting USB reconnect"
        );

        let _guard = self.io_lock.lock().await;
        let devices = match self.transport.discover().await {
            Ok(devices) => devices,
            Err(e) => {
                error!(printer = %self.id, error = %e, "reconnect discovery failed");
                self.with_state(|s| s.last_error = Some(e.to_string()));
                return false;
            }
        };

        if devices.is_empty() {
            warn!(printer = %self.id, "no USB devices found during reconnect");
            return false;
        }

        if devices.iter().any(|d| *d == configured) {
            self.with_state(|s| {
                s.is_connected = true;
                s.last_seen = Some(Utc::now());
            });
            info!(event = "device_reconnected", printer = %self.id, device = %configured, "device reconnected");
            return true;
        }

        // USB re-enumeration commonly reassigns the path. With exactly one
        // device present, adopt its identifier as ours. Known correctness
        // risk: with several compatible printers attached this can pick a
        // different physical device.
        if devices.len() == 1 {
            let new_device = devices[0].clone();
            if !new_device.is_empty() {
                info!(
                    event = "device_reconnected",
                    printer = %self.id,
                    old = %configured,
                    new = %new_device,
                    "device path changed, adopting new identifier"
                );
                self.set_device(new_device);
                self.with_state(|s| {
                    s.is_connected = true;
                    s.last_seen = Some(Utc::now());
                });
                return true;
            }
        }

        warn!(
            printer = %self.id,
            configured = %configured,
            available = ?devices,
            "configured device not found during reconnect"
        );
        false
    }
}

#[async_trait]
impl PrinterAdapter for UsbPrinter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// Probe the device by re-enumerating the bus; no cached flag is
    /// trusted. Ordinary unavailability is reported as `Offline`, never as
    /// an error.
    async fn get_status(&self) -> Result<PrinterStatus> {
        let device = self.device();
        if device.is_empty() {
            return Ok(PrinterStatus::Offline);
        }

        match self.transport.discover().await {
            Ok(devices) if devices.iter().any(|d| *d == device) => {
                self.with_state(|s| {
                    s.is_connected = true;
                    s.last_seen = Some(Utc::now());
                    s.consecutive_failures = 0;
                });
                Ok(PrinterStatus::Ready)
            }
            Ok(_) => {
                self.with_state(|s| s.is_connected = false);
                Ok(PrinterStatus::Offline)
            }
            Err(e) => {
                warn!(printer = %self.id, error = %e, "device probe failed");
                self.with_state(|s| {
                    s.is_connected = false;
                    s.last_error = Some(e.to_string());
                });
                Ok(PrinterStatus::Offline)
            }
        }
    }

    async fn print(&self, job: &PrintJob) -> Result<PrintResult> {
        if self.device().is_empty() {
            return Ok(PrintResult::failure(
                job.id,
                "no device configured",
                "NO_DEVICE",
            ));
        }

        if self.policy.auto_reconnect {
            self.print_with_retry(job).await
        } else {
            let _guard = self.io_lock.lock().await;
            self.do_print(job).await
        }
    }

    fn supported_content_types(&self) -> &[&str] {
        &["image/png"]
    }
}
