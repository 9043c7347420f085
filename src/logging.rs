//! Logging setup.
//!
//! Records go to `env_logger` as usual and are also kept in a small in-memory
//! ring so the status API can show the most recent lines.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

pub const LOG_CAPACITY: usize = 500;

/// Shared ring of formatted log lines, newest last.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    capacity: usize,
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct CapturingLogger {
    inner: env_logger::Logger,
    buffer: LogBuffer,
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        self.buffer.push(format!(
            "{} {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.args()
        ));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger (Info by default, `RUST_LOG` overrides).
///
/// Returns the buffer the status API reads. Calling this twice keeps the
/// first logger and returns an unconnected buffer.
pub fn init_logging() -> LogBuffer {
    let inner = env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .build();
    let max_level = inner.filter();
    let buffer = LogBuffer::new();

    let logger = CapturingLogger {
        inner,
        buffer: buffer.clone(),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }

    buffer
}
