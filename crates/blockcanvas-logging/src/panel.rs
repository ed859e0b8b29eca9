//! Status panel feed
//!
//! User-facing progress and error messages are ordinary tracing events
//! with target `"panel"`. [`PanelLayer`] copies them into a bounded
//! [`LogPanel`] that front ends render and clear.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use crate::context::CollectionContextGuard;
use crate::layers::span_collection;

/// Event target routed to the panel
pub const PANEL_TARGET: &str = "panel";

/// Severity shown next to a panel message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelLevel {
    Info,
    Warn,
    Error,
}

impl From<&Level> for PanelLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => PanelLevel::Error,
            Level::WARN => PanelLevel::Warn,
            _ => PanelLevel::Info,
        }
    }
}

/// One line of the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelEntry {
    pub timestamp: DateTime<Utc>,
    pub level: PanelLevel,
    /// Collection the message was logged under, when known
    pub collection: Option<String>,
    pub message: String,
}

impl fmt::Display for PanelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.timestamp.format("%H:%M:%S");
        match self.level {
            PanelLevel::Info => write!(f, "[{}] {}", time, self.message),
            PanelLevel::Warn => write!(f, "[{}] warning: {}", time, self.message),
            PanelLevel::Error => write!(f, "[{}] error: {}", time, self.message),
        }
    }
}

/// Bounded, shared list of panel entries
#[derive(Debug, Clone)]
pub struct LogPanel {
    entries: Arc<Mutex<VecDeque<PanelEntry>>>,
    capacity: usize,
}

impl LogPanel {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Layer feeding this panel
    pub fn layer(&self) -> PanelLayer {
        PanelLayer {
            panel: self.clone(),
        }
    }

    pub fn push(&self, entry: PanelEntry) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries oldest first
    pub fn entries(&self) -> Vec<PanelEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<PanelEntry> {
        self.entries.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Layer copying `"panel"` events into a [`LogPanel`]
#[derive(Debug, Clone)]
pub struct PanelLayer {
    panel: LogPanel,
}

impl<S> Layer<S> for PanelLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != PANEL_TARGET {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let collection = ctx
            .event_scope(event)
            .and_then(|mut scope| scope.find_map(|span| span_collection(&span)))
            .or_else(CollectionContextGuard::current_collection);

        self.panel.push(PanelEntry {
            timestamp: Utc::now(),
            level: metadata.level().into(),
            collection,
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
