// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway configuration types.
//
// Loading these from a file is the embedding application's concern; the types
// deserialize from any serde source and fall back to sensible defaults for
// absent fields.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-printer job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Admission ceiling counting pending plus in-flight jobs.
    pub max_queue_size: usize,
    /// How long an offline-held job waits before expiring.
    pub offline_queue_timeout: Duration,
    /// How often the expiry sweep wakes up.
    pub sweep_interval: Duration,
    /// How many terminal jobs the history ring retains.
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            offline_queue_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            history_limit: 50,
        }
    }
}

/// Retry/reconnect behavior for one device adapter.
///
/// Immutable after construction; one instance per adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencePolicy {
    /// Whether print attempts retry through reconnects at all.
    pub auto_reconnect: bool,
    /// Maximum delivery attempts per job.
    pub max_retries: u32,
    /// Fixed backoff between attempts.
    pub retry_delay: Duration,
    /// Suggested polling interval for the health monitor.
    pub health_check_interval: Duration,
    /// Whether the queue may hold jobs while the printer is offline.
    pub offline_queue_enabled: bool,
    /// Expiry for offline-held jobs.
    pub offline_queue_timeout: Duration,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            health_check_interval: Duration::from_secs(30),
            offline_queue_enabled: true,
            offline_queue_timeout: Duration::from_secs(600),
        }
    }
}

/// One entry in the intent routing table.
///
/// Accepts both the short form (`"shipping-label": "label"`) and the
/// extended form (`"shipping-label": { printer = "label", description = "..." }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteTarget {
    Printer(String),
    Detailed {
        printer: String,
        #[serde(default)]
        description: String,
    },
}

impl RouteTarget {
    pub fn printer_id(&self) -> &str {
        match self {
            Self::Printer(id) => id,
            Self::Detailed { printer, .. } => printer,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Printer(_) => "",
            Self::Detailed { description, .. } => description,
        }
    }
}

/// Top-level gateway settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub queue: QueueConfig,
    pub resilience: ResiliencePolicy,
    /// Intent name -> routing target.
    pub routing: HashMap<String, RouteTarget>,
    /// Fallback printers by payload class.
    pub defaults: RoutingDefaults,
}

/// Default printers used when an intent has no explicit route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingDefaults {
    pub label_printer: String,
    pub document_printer: String,
}

impl Default for RoutingDefaults {
    fn default() -> Self {
        Self {
            label_printer: "label".into(),
            document_printer: "document".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_defaults() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.max_queue_size, 100);
        assert_eq!(cfg.offline_queue_timeout, Duration::from_secs(600));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
        assert_eq!(cfg.history_limit, 50);
    }

    #[test]
    fn resilience_defaults() {
        let policy = ResiliencePolicy::default();
        assert!(policy.auto_reconnect);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
        assert_eq!(policy.health_check_interval, Duration::from_secs(30));
        assert!(policy.offline_queue_enabled);
        assert_eq!(policy.offline_queue_timeout, Duration::from_secs(600));
    }

    #[test]
    fn route_target_accepts_both_forms() {
        let short: RouteTarget = serde_json::from_str("\"label\"").unwrap();
        assert_eq!(short.printer_id(), "label");
        assert_eq!(short.description(), "");

        let long: RouteTarget = serde_json::from_str(
            r#"{"printer": "document", "description": "A4 invoices"}"#,
        )
        .unwrap();
        assert_eq!(long.printer_id(), "document");
        assert_eq!(long.description(), "A4 invoices");
    }

    #[test]
    fn gateway_config_tolerates_missing_fields() {
        let cfg: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.queue.max_queue_size, 100);
        assert!(cfg.routing.is_empty());
        assert_eq!(cfg.defaults.label_printer, "label");
    }
}
