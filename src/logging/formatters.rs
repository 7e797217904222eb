use std::{fmt, fmt::Write as _, sync::Arc};

use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields,
    },
    registry::LookupSpan,
};
use yansi::{Condition, Paint};

use super::{
    level::{LevelLabels, Severity},
    logger::{Config, DEFAULT_DATETIME_FORMAT},
    record::FieldVisitor,
};

/// Renders one human readable line per record:
/// `<time> <label> <span scope:> <message> <key=value ...>`.
pub struct ConsoleFormatter {
    config: Config,
    labels: Arc<LevelLabels>,
}

impl ConsoleFormatter {
    pub fn new(config: Config, labels: Arc<LevelLabels>) -> Self {
        Self { config, labels }
    }

    fn timestamp(&self) -> String {
        let now = chrono::Local::now();
        let mut time = String::new();
        if write!(time, "{}", now.format(&self.config.datetime_format)).is_err() {
            time = now.format(DEFAULT_DATETIME_FORMAT).to_string();
        }

        if self.config.use_ansi {
            time.bright_black().whenever(Condition::ALWAYS).to_string()
        } else {
            time
        }
    }

    fn format_field(&self, name: &str, value: &str) -> String {
        if self.config.use_ansi {
            format!("{}={}", name.cyan().whenever(Condition::ALWAYS), value)
        } else {
            format!("{}={}", name, value)
        }
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        // an explicit empty severity means the record carries no level
        let level = match visitor.severity.as_deref() {
            Some("") => None,
            Some(name) => Some(name),
            None => Some(Severity::from_tracing(event.metadata().level()).as_str()),
        };

        let mut parts = vec![self.timestamp()];

        let label = self.labels.resolve(level);
        if !label.is_empty() {
            parts.push(label.into_owned());
        }

        if let Some(scope) = ctx.event_scope() {
            let mut spans = String::new();
            for span in scope.from_root() {
                spans.push_str(span.name());

                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.fields.is_empty() {
                        write!(spans, "{{{}}}", fields.fields)?;
                    }
                }
                spans.push(':');
            }
            parts.push(spans);
        }

        if let Some(message) = visitor.message.filter(|message| !message.is_empty()) {
            parts.push(message);
        }

        for (name, value) in &visitor.fields {
            parts.push(self.format_field(name, value));
        }

        writeln!(writer, "{}", parts.join(" "))
    }
}
