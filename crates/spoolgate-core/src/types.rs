// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Spoolgate print gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observed state of a physical or simulated printer.
///
/// Not globally cached: adapters may re-derive this from the underlying
/// connection on every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Ready,
    Busy,
    Offline,
    Error,
}

impl PrinterStatus {
    /// Whether the printer can accept work right now or shortly.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready | Self::Busy)
    }
}

impl std::fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Lifecycle states of a queued print job.
///
/// Queued -> Printing -> Completed | Failed
/// QueuedOffline -> Queued (promoted) | Expired
/// Queued | QueuedOffline -> Cancelled (only before printing starts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in FIFO order to be sent.
    Queued,
    /// Held while the printer is offline; carries an expiry deadline.
    QueuedOffline,
    /// Currently being transmitted to the printer.
    Printing,
    /// Delivered successfully.
    Completed,
    /// Delivery failed; see the job's error field.
    Failed,
    /// Removed by the caller before printing started.
    Cancelled,
    /// Timed out while waiting for an offline printer.
    Expired,
}

impl JobStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

/// A print request as admitted to the gateway.
///
/// The payload is opaque to the queue and the resilience layer; rendering and
/// format conversion happen behind the adapter's transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Target printer id this job was routed to.
    pub printer_id: String,
    pub filename: String,
    #[serde(skip_serializing, default)]
    pub data: Vec<u8>,
    /// MIME type of the payload (e.g. "image/png").
    pub content_type: String,
    pub copies: u32,
    pub created_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(
        printer_id: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            printer_id: printer_id.into(),
            filename: filename.into(),
            data,
            content_type: content_type.into(),
            copies: 1,
            created_at: Utc::now(),
        }
    }

    /// Builder-style copy count override.
    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }
}

/// Outcome of a single print delivery as reported by an adapter.
///
/// Adapters return this for definitive outcomes; they only raise errors for
/// exceptional conditions the retry layer may still classify and absorb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintResult {
    pub success: bool,
    pub job_id: JobId,
    pub message: String,
    pub error_code: Option<String>,
}

impl PrintResult {
    pub fn ok(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn failure(
        job_id: JobId,
        message: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            job_id,
            message: message.into(),
            error_code: Some(error_code.into()),
        }
    }
}

/// Classification of a USB delivery error for the reconnect/retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsbErrorKind {
    /// Disconnect, sleep, or bus hiccup; worth a reconnect and retry.
    Recoverable,
    /// Configuration or driver problem; retrying will not help.
    Permanent,
    /// Unclassified; treated as non-retryable by callers.
    Unknown,
}
