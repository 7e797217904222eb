use std::fmt;

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};

use super::level::Severity;

pub(crate) const SEVERITY_FIELD: &str = "severity";
const MESSAGE_FIELD: &str = "message";

/// A log record as handed to a [`RemoteSink`](super::RemoteSink).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(String, String)>,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub(crate) fn from_event(event: &tracing::Event<'_>) -> Self {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let severity = visitor
            .severity
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or_else(|| Severity::from_tracing(event.metadata().level()));

        Self {
            severity,
            message: visitor.message.unwrap_or_default(),
            fields: visitor
                .fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            timestamp: Utc::now(),
        }
    }
}

/// Splits an event's fields into message, severity override and the rest.
#[derive(Default)]
pub(crate) struct FieldVisitor {
    pub message: Option<String>,
    pub severity: Option<String>,
    pub fields: Vec<(&'static str, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(value.to_string()),
            SEVERITY_FIELD => self.severity = Some(value.to_string()),
            name => self.fields.push((name, value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(format!("{:?}", value)),
            SEVERITY_FIELD => self.severity = Some(format!("{:?}", value)),
            name => self.fields.push((name, format!("{:?}", value))),
        }
    }
}
