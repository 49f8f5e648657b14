// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Registry of all printer adapters known to this gateway process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use spoolgate_core::types::PrinterStatus;

use crate::adapter::PrinterAdapter;

/// Thread-safe map of printer id -> adapter.
///
/// Insertion order is not significant; the health monitor and the HTTP layer
/// both enumerate through `list_all`.
#[derive(Default)]
pub struct PrinterRegistry {
    printers: Mutex<HashMap<String, Arc<dyn PrinterAdapter>>>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own id, replacing any previous entry.
    pub fn register(&self, printer: Arc<dyn PrinterAdapter>) {
        let id = printer.id().to_string();
        info!(printer = %id, name = printer.name(), "printer registered");
        self.printers
            .lock()
            .expect("printer registry lock poisoned")
            .insert(id, printer);
    }

    pub fn get(&self, printer_id: &str) -> Option<Arc<dyn PrinterAdapter>> {
        self.printers
            .lock()
            .expect("printer registry lock poisoned")
            .get(printer_id)
            .cloned()
    }

    pub fn list_all(&self) -> Vec<Arc<dyn PrinterAdapter>> {
        self.printers
            .lock()
            .expect("printer registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Probe every registered printer once.
    pub async fn all_status(&self) -> HashMap<String, PrinterStatus> {
        let printers = self.list_all();
        let mut statuses = HashMap::with_capacity(printers.len());
        for printer in printers {
            if let Ok(status) = printer.get_status().await {
                statuses.insert(printer.id().to_string(), status);
            }
        }
        statuses
    }
}
