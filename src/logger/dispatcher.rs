//! Fan-out dispatcher: a sink that forwards every record to all of its children.

use std::sync::Arc;

use async_trait::async_trait;

use crate::logger::record::{Attr, Level, Record};
use crate::logger::sink::{Sink, SinkError};

/// Ordered set of child sinks.
///
/// The dispatcher does not filter: `handle` reaches every child whatever the
/// children answer from `enabled`.
#[derive(Clone)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Close every child, even after failures.
    ///
    /// Each failure is reported as a diagnostic; the first one is returned
    /// once all children have been closed.
    pub async fn close_all(&self) -> Result<(), SinkError> {
        let mut first_err = None;
        for (index, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.close().await {
                tracing::warn!(sink_index = index, error = %e, "Failed to close log sink");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Sink for Dispatcher {
    fn enabled(&self, level: Level) -> bool {
        self.sinks.iter().any(|sink| sink.enabled(level))
    }

    fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.handle(record) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Sink> {
        Arc::new(Self::new(
            self.sinks
                .iter()
                .map(|sink| sink.with_attrs(attrs.clone()))
                .collect(),
        ))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Sink> {
        Arc::new(Self::new(
            self.sinks.iter().map(|sink| sink.with_group(name)).collect(),
        ))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.close_all().await
    }
}
