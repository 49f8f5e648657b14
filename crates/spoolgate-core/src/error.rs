// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Spoolgate.

use thiserror::Error;

/// Top-level error type for all Spoolgate operations.
#[derive(Debug, Error)]
pub enum SpoolgateError {
    // -- Queue errors --
    #[error("queue full (max {max} jobs)")]
    QueueFull { max: usize },

    #[error("no printer registered with id {0}")]
    PrinterNotFound(String),

    #[error("printer {printer} unavailable: {status}")]
    PrinterUnavailable { printer: String, status: String },

    #[error("job validation failed: {0}")]
    InvalidJob(String),

    // -- Device errors --
    #[error("USB device error: {0}")]
    Usb(String),

    /// Transport-level failure from the vendor backend. Carries the
    /// underlying error so the classifier can walk the cause chain.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // -- Monitor errors --
    #[error("status callback failed: {0}")]
    StatusCallback(String),

    // -- Ambient --
    // Transparent so the classifier sees the OS error text, not a wrapper
    // prefix that would shadow the message heuristics.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpoolgateError {
    /// Wrap an arbitrary backend error as a transport failure, preserving it
    /// as the source for cause-chain classification.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SpoolgateError>;
