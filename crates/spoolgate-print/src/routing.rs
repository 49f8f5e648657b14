// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Intent-based routing for print jobs.
//
// Callers send a semantic intent ("shipping-label", "invoice"); the gateway
// decides which physical printer handles it. Unrouted intents fall back to a
// default printer chosen by payload class.

use std::collections::HashMap;

use tracing::debug;

use spoolgate_core::config::{GatewayConfig, RouteTarget};

/// One resolved intent for API discovery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Route {
    pub intent: String,
    pub printer_id: String,
    pub description: String,
}

/// Maps print intents to printer ids.
pub struct PrintRouter {
    routes: HashMap<String, RouteTarget>,
    default_label_printer: String,
    default_document_printer: String,
}

impl Default for PrintRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            default_label_printer: "label".into(),
            default_document_printer: "document".into(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            routes: config.routing.clone(),
            default_label_printer: config.defaults.label_printer.clone(),
            default_document_printer: config.defaults.document_printer.clone(),
        }
    }

    /// Resolve an intent to a printer id, or `None` if not configured.
    pub fn resolve(&self, intent: &str) -> Option<&str> {
        self.routes.get(intent).map(RouteTarget::printer_id)
    }

    /// Resolve an intent, falling back to a default by content type.
    pub fn resolve_or_default(&self, intent: &str, content_type: &str) -> &str {
        if let Some(printer_id) = self.resolve(intent) {
            return printer_id;
        }

        debug!(intent, content_type, "intent not configured, using default route");
        if content_type.starts_with("image/") {
            &self.default_label_printer
        } else if content_type == "application/pdf" {
            &self.default_document_printer
        } else {
            &self.default_label_printer
        }
    }

    /// All configured intents for API discovery.
    pub fn list_intents(&self) -> Vec<Route> {
        self.routes
            .iter()
            .map(|(intent, target)| Route {
                intent: intent.clone(),
                printer_id: target.printer_id().to_string(),
                description: target.description().to_string(),
            })
            .collect()
    }

    /// Programmatically add a route.
    pub fn add_route(
        &mut self,
        intent: impl Into<String>,
        printer_id: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.routes.insert(
            intent.into(),
            RouteTarget::Detailed {
                printer: printer_id.into(),
                description: description.into(),
            },
        );
    }
}
