//! The sink capability shared by every log destination.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::bus::BusError;
use crate::logger::record::{Attr, Level, Record};

/// Errors a sink reports from `handle` or `close`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// A consumer of log records.
///
/// `handle` is synchronous: asynchronous sinks only enqueue and return.
#[async_trait]
pub trait Sink: Send + Sync {
    fn enabled(&self, level: Level) -> bool;

    fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError>;

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Sink>;

    fn with_group(&self, name: &str) -> Arc<dyn Sink>;

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Attributes and groups accumulated through `with_attrs`/`with_group`.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    attrs: Vec<Attr>,
    groups: Vec<String>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.groups.is_empty()
    }

    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut scope = self.clone();
        scope
            .attrs
            .extend(attrs.into_iter().map(|attr| self.qualify(attr)));
        scope
    }

    pub fn with_group(&self, name: &str) -> Self {
        let mut scope = self.clone();
        if !name.is_empty() {
            scope.groups.push(name.to_string());
        }
        scope
    }

    /// Returns `record` itself when the scope is empty, otherwise a copy with
    /// scope attrs first and its own keys qualified by the open groups.
    pub fn apply(&self, record: &Arc<Record>) -> Arc<Record> {
        if self.is_empty() {
            return Arc::clone(record);
        }
        let mut attrs = self.attrs.clone();
        attrs.extend(record.attrs.iter().cloned().map(|attr| self.qualify(attr)));
        Arc::new(Record::at(record.time, record.level, record.message.clone(), attrs))
    }

    fn qualify(&self, attr: Attr) -> Attr {
        if self.groups.is_empty() {
            return attr;
        }
        Attr {
            key: format!("{}.{}", self.groups.join("."), attr.key),
            value: attr.value,
        }
    }
}
