//! Colorized console sink.
//!
//! Writes happen on the caller's thread so interactive output keeps call order.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::logger::record::{Attr, Level, Record};
use crate::logger::sink::{Scope, Sink, SinkError};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Synchronous sink writing human-readable lines.
#[derive(Clone)]
pub struct ConsoleSink {
    writer: SharedWriter,
    scope: Scope,
}

impl ConsoleSink {
    /// Console sink on standard output.
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            scope: Scope::default(),
        }
    }

    fn scoped(&self, scope: Scope) -> Arc<dyn Sink> {
        Arc::new(Self {
            writer: Arc::clone(&self.writer),
            scope,
        })
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError> {
        let mut line = self.scope.apply(record).console_line();
        line.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Sink> {
        self.scoped(self.scope.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Sink> {
        self.scoped(self.scope.with_group(name))
    }
}
