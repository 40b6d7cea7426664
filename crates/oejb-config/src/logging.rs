use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

use crate::LoggingConfig;

/// The most recent formatted log lines, oldest first.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Up to `n` of the newest lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        lines.iter().skip(lines.len().saturating_sub(n)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Feeds each formatted event into a [`LogBuffer`], one entry per line.
struct BufferSink(Arc<LogBuffer>);

impl<'a> MakeWriter<'a> for BufferSink {
    type Writer = EventLines;

    fn make_writer(&'a self) -> Self::Writer {
        EventLines {
            buffer: self.0.clone(),
            pending: Vec::new(),
        }
    }
}

/// Collects one event's output; the lines land in the buffer on drop.
struct EventLines {
    buffer: Arc<LogBuffer>,
    pending: Vec<u8>,
}

impl Write for EventLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventLines {
    fn drop(&mut self) {
        String::from_utf8_lossy(&self.pending)
            .lines()
            .filter(|line| !line.is_empty())
            .for_each(|line| self.buffer.push(line));
    }
}

static INSTALLED: OnceLock<Arc<LogBuffer>> = OnceLock::new();

/// Installs the global `tracing` subscriber described by `logging` and returns
/// the in-memory buffer every event is copied into.
///
/// Only the first call installs anything; later calls hand back the same
/// buffer. A log file that can't be opened disables just the file sink.
pub fn init_tracing(logging: &LoggingConfig) -> Arc<LogBuffer> {
    INSTALLED
        .get_or_init(|| {
            let buffer = Arc::new(LogBuffer::new(logging.buffer_lines));
            install(logging, buffer.clone());
            buffer
        })
        .clone()
}

fn install(logging: &LoggingConfig, buffer: Arc<LogBuffer>) {
    let mut sinks = BoxMakeWriter::new(BufferSink(buffer));
    if logging.stderr {
        sinks = BoxMakeWriter::new(sinks.and(io::stderr));
    }
    let file = logging.file.as_deref().map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| (path, err))
    });
    let mut file_error = None;
    match file {
        Some(Ok(file)) => sinks = BoxMakeWriter::new(sinks.and(std::sync::Mutex::<File>::new(file))),
        Some(Err(err)) => file_error = Some(err),
        None => {}
    }

    let (json, text) = if logging.json {
        (Some(tracing_subscriber::fmt::layer().json().with_writer(sinks)), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(sinks)))
    };
    let installed = tracing_subscriber::registry()
        .with(logging.env_filter())
        .with(json)
        .with(text)
        .try_init()
        .is_ok();

    if let (true, Some((path, err))) = (installed, file_error) {
        tracing::warn!(target: "oejb.config", path = %path.display(), error = %err, "can't open log file; file logging disabled");
    }
}
