use std::{sync::Arc, time::Duration};

use eyre::Context;
use sentry::{
    protocol::{Event, Value},
    types::Dsn,
    ClientOptions,
};
use tracing::Subscriber;
use tracing_subscriber::{layer, Layer};

use super::{level::Severity, record::Record, RemoteSink};

const LOGGER_NAME: &str = "zlogger";

/// Feeds every event of a dispatch to a [`RemoteSink`], next to the console
/// layer.
pub(crate) struct RemoteLayer {
    sink: Arc<dyn RemoteSink>,
}

impl RemoteLayer {
    pub fn new(sink: Arc<dyn RemoteSink>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for RemoteLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: layer::Context<'_, S>) {
        let record = Record::from_event(event);

        if let Err(err) = self.sink.send(&record) {
            eprintln!("zlogger: could not forward event: {:#}", err);
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentryOptions {
    pub dsn: String,
    pub release: String,
    pub environment: String,
    /// Records below this severity are dropped by the sink.
    pub min_severity: Severity,
}

impl SentryOptions {
    pub fn new(
        dsn: impl Into<String>,
        release: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            dsn: dsn.into(),
            release: release.into(),
            environment: environment.into(),
            min_severity: Severity::Error,
        }
    }

    pub fn with_min_severity(self, min_severity: Severity) -> Self {
        Self {
            min_severity,
            ..self
        }
    }
}

/// Sends records to Sentry as events.
pub struct SentrySink {
    client: sentry::Client,
    min_severity: Severity,
}

impl SentrySink {
    pub fn new(options: &SentryOptions) -> eyre::Result<Self> {
        Self::with_client_options(client_options(options)?, options.min_severity)
    }

    fn with_client_options(options: ClientOptions, min_severity: Severity) -> eyre::Result<Self> {
        let client = sentry::Client::from_config(sentry::apply_defaults(options));

        if !client.is_enabled() {
            return Err(eyre::eyre!("Sentry client is disabled"));
        }

        Ok(Self {
            client,
            min_severity,
        })
    }
}

fn client_options(options: &SentryOptions) -> eyre::Result<ClientOptions> {
    if options.dsn.trim().is_empty() {
        return Err(eyre::eyre!("Sentry DSN is empty"));
    }

    let dsn: Dsn = options.dsn.parse().context("Failed parsing Sentry DSN")?;

    Ok(ClientOptions {
        dsn: Some(dsn),
        release: Some(options.release.clone().into()),
        environment: Some(options.environment.clone().into()),
        debug: true,
        attach_stacktrace: true,
        ..Default::default()
    })
}

impl RemoteSink for SentrySink {
    fn send(&self, record: &Record) -> eyre::Result<()> {
        if record.severity < self.min_severity {
            return Ok(());
        }

        self.client.capture_event(sentry_event(record), None);
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.client.flush(Some(timeout))
    }
}

fn sentry_level(severity: Severity) -> sentry::Level {
    match severity {
        Severity::Trace | Severity::Debug => sentry::Level::Debug,
        Severity::Info => sentry::Level::Info,
        Severity::Warn => sentry::Level::Warning,
        Severity::Error => sentry::Level::Error,
        Severity::Fatal | Severity::Panic => sentry::Level::Fatal,
    }
}

fn sentry_event(record: &Record) -> Event<'static> {
    let mut event = Event {
        level: sentry_level(record.severity),
        message: Some(record.message.clone()),
        logger: Some(LOGGER_NAME.to_string()),
        timestamp: record.timestamp.into(),
        ..Default::default()
    };

    for (name, value) in &record.fields {
        event
            .extra
            .insert(name.clone(), Value::String(value.clone()));
    }

    event
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parking_lot::Mutex;
    use sentry::test::TestTransport;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    fn record(severity: Severity, message: &str) -> Record {
        Record {
            severity,
            message: message.to_string(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn captured_sink(min_severity: Severity) -> (SentrySink, Arc<TestTransport>) {
        let transport = TestTransport::new();
        let options = SentryOptions::new("https://key@sentry.invalid/1", "1.0.0", "test")
            .with_min_severity(min_severity);

        let mut client_options = client_options(&options).unwrap();
        client_options.transport = Some(Arc::new(transport.clone()));

        let sink = SentrySink::with_client_options(client_options, options.min_severity).unwrap();
        (sink, transport)
    }

    fn captured_messages(transport: &TestTransport) -> Vec<(sentry::Level, String)> {
        transport
            .fetch_and_clear_envelopes()
            .iter()
            .filter_map(|envelope| envelope.event())
            .map(|event| (event.level, event.message.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn sink_drops_records_below_the_minimum_severity() {
        let (sink, transport) = captured_sink(Severity::Error);

        for (severity, message) in [
            (Severity::Debug, "noise"),
            (Severity::Warn, "slow"),
            (Severity::Error, "failed"),
            (Severity::Fatal, "gone"),
        ] {
            sink.send(&record(severity, message)).unwrap();
        }

        assert_eq!(
            captured_messages(&transport),
            vec![
                (sentry::Level::Error, "failed".to_string()),
                (sentry::Level::Fatal, "gone".to_string()),
            ]
        );
    }

    #[test]
    fn lowered_minimum_forwards_warnings() {
        let (sink, transport) = captured_sink(Severity::Warn);

        sink.send(&record(Severity::Info, "hello")).unwrap();
        sink.send(&record(Severity::Warn, "slow")).unwrap();

        assert_eq!(
            captured_messages(&transport),
            vec![(sentry::Level::Warning, "slow".to_string())]
        );
    }

    #[test]
    fn valid_dsn_builds_an_enabled_sink() {
        let sink = SentrySink::new(&SentryOptions::new("https://key@127.0.0.1:9/1", "1.0.0", "test"));
        assert!(sink.is_ok_and(|sink| sink.client.is_enabled()));
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<Record>>,
    }

    impl RemoteSink for RecordingSink {
        fn send(&self, record: &Record) -> eyre::Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }

        fn flush(&self, _timeout: Duration) -> bool {
            true
        }
    }

    #[test]
    fn layer_forwards_message_severity_and_fields() {
        let sink = Arc::new(RecordingSink::default());
        let subscriber = tracing_subscriber::registry().with(RemoteLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(user = "ada", attempts = 3, "slow login");
            tracing::error!(severity = "fatal", "disk gone");
        });

        let records = sink.records.lock();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].severity, Severity::Warn);
        assert_eq!(records[0].message, "slow login");
        assert_eq!(
            records[0].fields,
            vec![
                ("user".to_string(), "ada".to_string()),
                ("attempts".to_string(), "3".to_string()),
            ]
        );

        assert_eq!(records[1].severity, Severity::Fatal);
        assert!(records[1].fields.is_empty());
    }

    #[test]
    fn invalid_dsn_is_rejected() {
        let err = SentrySink::new(&SentryOptions::new("not a dsn", "1.0.0", "test"))
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("Failed parsing Sentry DSN"));
    }

    #[test]
    fn empty_dsn_is_rejected() {
        assert!(SentrySink::new(&SentryOptions::new("  ", "1.0.0", "test")).is_err());
    }

    #[test]
    fn event_carries_record_details() {
        let record = Record {
            severity: Severity::Panic,
            message: "boom".to_string(),
            fields: vec![("job".to_string(), "nightly".to_string())],
            timestamp: Utc::now(),
        };

        let event = sentry_event(&record);

        assert_eq!(event.level, sentry::Level::Fatal);
        assert_eq!(event.message.as_deref(), Some("boom"));
        assert_eq!(event.logger.as_deref(), Some(LOGGER_NAME));
        assert_eq!(
            event.extra.get("job"),
            Some(&Value::String("nightly".to_string()))
        );
    }

    #[test]
    fn levels_map_onto_sentry_levels() {
        assert_eq!(sentry_level(Severity::Trace), sentry::Level::Debug);
        assert_eq!(sentry_level(Severity::Warn), sentry::Level::Warning);
        assert_eq!(sentry_level(Severity::Error), sentry::Level::Error);
        assert_eq!(sentry_level(Severity::Fatal), sentry::Level::Fatal);
    }
}
