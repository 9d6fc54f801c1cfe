//! Test log capture: a tracing layer that records events for assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

static LOG_STORAGE: OnceLock<Arc<Mutex<LogStorage>>> = OnceLock::new();

const MAX_ENTRIES: usize = 1000;

/// A captured log event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Default)]
pub struct LogStorage {
    entries: VecDeque<LogEntry>,
}

impl LogStorage {
    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

fn storage() -> Arc<Mutex<LogStorage>> {
    LOG_STORAGE
        .get_or_init(|| Arc::new(Mutex::new(LogStorage::default())))
        .clone()
}

/// All captured entries, oldest first.
#[must_use]
pub fn get_logs() -> Vec<LogEntry> {
    storage()
        .lock()
        .map(|s| s.entries.iter().cloned().collect())
        .unwrap_or_default()
}

/// Whether any captured message at `level` contains `needle`.
#[must_use]
pub fn logs_contain_at(level: Level, needle: &str) -> bool {
    get_logs()
        .iter()
        .any(|e| e.level == level && e.message.contains(needle))
}

#[must_use]
pub fn logs_contain(needle: &str) -> bool {
    get_logs().iter().any(|e| e.message.contains(needle))
}

pub fn clear_logs() {
    if let Ok(mut s) = storage().lock() {
        s.entries.clear();
    }
}

struct CaptureLayer {
    storage: Arc<Mutex<LogStorage>>,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let entry = LogEntry {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };
        if let Ok(mut storage) = self.storage.lock() {
            storage.push(entry);
        }
    }
}

/// Install the capture layer as the global subscriber (once per process)
/// and clear previously captured entries.
pub fn init_test_logging(level: &str) {
    clear_logs();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter).with(CaptureLayer {
        storage: storage(),
    });
    // already installed by an earlier test in this process
    let _ = tracing::subscriber::set_global_default(subscriber);
}
