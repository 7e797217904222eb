use std::{
    fmt::{self, Display},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use eyre::Context;
use parking_lot::Mutex;
use tracing::{dispatcher, level_filters::LevelFilter, span::Id, Dispatch, Level, Span};
use tracing_subscriber::{
    fmt::{format::DefaultFields, FormattedFields},
    layer::SubscriberExt,
    registry::{LookupSpan, Registry},
};

use super::{
    formatters::ConsoleFormatter,
    level::{LevelLabels, Severity},
    remote::{RemoteLayer, SentryOptions, SentrySink},
    rotation::RotatingFile,
    sinks::LogWriter,
    MultiLevelLogger, RemoteSink, SimpleLogger,
};

/// `YYYY/DD/MM HH:MM:SS`
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y/%d/%m %H:%M:%S";

const TERMINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Config {
    pub datetime_format: String,
    pub use_ansi: bool,
    pub level: LevelFilter,
}

impl Config {
    pub fn new() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            use_ansi: true,
            level: LevelFilter::TRACE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// A leveled logger writing to stderr or a rotating file, optionally
/// mirroring every record to a remote sink.
///
/// Clones share the same writer, label table and remote sink.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    labels: Arc<LevelLabels>,
    file: Option<Arc<Mutex<RotatingFile>>>,
    path: Option<PathBuf>,
    remote: Option<Arc<dyn RemoteSink>>,
}

// `[parent: span,]` goes in front of the level, the rest after it.
macro_rules! emit {
    ($severity:expr, [$($parent:tt)*] $($event:tt)+) => {
        match $severity {
            Severity::Trace => tracing::event!($($parent)* Level::TRACE, $($event)+),
            Severity::Debug => tracing::event!($($parent)* Level::DEBUG, $($event)+),
            Severity::Info => tracing::event!($($parent)* Level::INFO, $($event)+),
            Severity::Warn => tracing::event!($($parent)* Level::WARN, $($event)+),
            Severity::Error => tracing::event!($($parent)* Level::ERROR, $($event)+),
            Severity::Fatal => {
                tracing::event!($($parent)* Level::ERROR, severity = "fatal", $($event)+)
            }
            Severity::Panic => {
                tracing::event!($($parent)* Level::ERROR, severity = "panic", $($event)+)
            }
        }
    };
}

impl Logger {
    /// Logs to `filename` through a rotating, compressing writer, or to stderr
    /// when `filename` is empty.
    ///
    /// * `max_size_mb` - size that triggers a rotation, 0 for the 100 MB default
    /// * `max_backups` - rotated files to keep, 0 keeps all of them
    ///
    /// Never fails: the file is opened on the first write.
    pub fn new(
        filename: impl AsRef<Path>,
        max_size_mb: u64,
        max_backups: usize,
        enable_color: bool,
    ) -> Self {
        Builder::new()
            .with_color(enable_color)
            .with_file_sink(filename.as_ref(), max_size_mb, max_backups)
            .build()
    }

    /// Colored stderr logger, handy in tests and diagnostics.
    pub fn stderr() -> Self {
        Self::new("", 0, 0, true)
    }

    /// Same as [`Logger::new`], also reporting error records to Sentry.
    ///
    /// A DSN Sentry can't work with leaves the logger console only, after
    /// logging a warning about it.
    pub fn with_sentry(
        filename: impl AsRef<Path>,
        max_size_mb: u64,
        max_backups: usize,
        enable_color: bool,
        dsn: &str,
        release: &str,
        environment: &str,
    ) -> Self {
        Builder::new()
            .with_color(enable_color)
            .with_file_sink(filename.as_ref(), max_size_mb, max_backups)
            .with_sentry(SentryOptions::new(dsn, release, environment))
            .build()
    }

    fn assemble(
        config: &Config,
        labels: Arc<LevelLabels>,
        writer: LogWriter,
        path: Option<PathBuf>,
        remote: Option<Arc<dyn RemoteSink>>,
    ) -> Self {
        let console = tracing_subscriber::fmt::layer()
            .with_ansi(config.use_ansi)
            .with_writer(writer.clone())
            .event_format(ConsoleFormatter::new(config.clone(), labels.clone()));

        let subscriber = tracing_subscriber::registry()
            .with(config.level)
            .with(console);

        let dispatch = match &remote {
            Some(sink) => Dispatch::new(subscriber.with(RemoteLayer::new(sink.clone()))),
            None => Dispatch::new(subscriber),
        };

        Self {
            dispatch,
            labels,
            file: writer.rotating_file().cloned(),
            path,
            remote,
        }
    }

    /// The `tracing` dispatch behind this logger, for attaching structured
    /// fields or spans:
    ///
    /// ```
    /// let logger = zlogger::Logger::stderr();
    /// tracing::dispatcher::with_default(logger.underlying(), || {
    ///     tracing::info!(user = "ada", "signed in");
    /// });
    /// ```
    pub fn underlying(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runs `f` with this logger as the default dispatch.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    pub fn labels(&self) -> &LevelLabels {
        &self.labels
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteSink>> {
        self.remote.as_ref()
    }

    /// Forces a rotation of the log file. Does nothing when logging to stderr.
    pub fn rotate(&self) -> eyre::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let mut file = file.lock();
        file.rotate()
            .with_context(|| format!("Failed rotating log file {}", file.path().display()))
    }

    /// Flushes the log file and waits up to `timeout` for the remote sink to
    /// drain. Returns false when the remote sink did not make it in time.
    ///
    /// Remote records still buffered at process exit are lost, so owners of a
    /// remote-reporting logger should call this before exiting.
    pub fn flush(&self, timeout: Duration) -> bool {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }

        match &self.remote {
            Some(remote) => remote.flush(timeout),
            None => true,
        }
    }

    fn record(&self, severity: Severity, message: &str) {
        dispatcher::with_default(&self.dispatch, || emit!(severity, [] "{}", message));
    }

    /// Span ids are only meaningful inside the registry that issued them, so a
    /// span from another dispatch is attached as a `context` field instead.
    fn record_in(&self, severity: Severity, span: &Span, message: &str) {
        dispatcher::with_default(&self.dispatch, || {
            if self.owns(span) {
                emit!(severity, [parent: span,] "{}", message)
            } else if let Some(context) = foreign_context(span) {
                emit!(severity, [] context = %context, "{}", message)
            } else {
                emit!(severity, [] "{}", message)
            }
        });
    }

    fn owns(&self, span: &Span) -> bool {
        let Some(ours) = self.dispatch.downcast_ref::<Registry>() else {
            return false;
        };

        span.with_subscriber(|(_, dispatch)| {
            dispatch
                .downcast_ref::<Registry>()
                .is_some_and(|theirs| std::ptr::eq(ours, theirs))
        })
        .unwrap_or(false)
    }

    pub fn debug(&self, values: &[&dyn Display]) {
        self.record(Severity::Debug, &concat(values));
    }

    pub fn info(&self, values: &[&dyn Display]) {
        self.record(Severity::Info, &concat(values));
    }

    pub fn warn(&self, values: &[&dyn Display]) {
        self.record(Severity::Warn, &concat(values));
    }

    pub fn error(&self, values: &[&dyn Display]) {
        self.record(Severity::Error, &concat(values));
    }

    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Debug, &args.to_string());
    }

    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Info, &args.to_string());
    }

    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Warn, &args.to_string());
    }

    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Error, &args.to_string());
    }

    pub fn debug_ctx(&self, span: &Span, values: &[&dyn Display]) {
        self.record_in(Severity::Debug, span, &concat(values));
    }

    pub fn info_ctx(&self, span: &Span, values: &[&dyn Display]) {
        self.record_in(Severity::Info, span, &concat(values));
    }

    pub fn warn_ctx(&self, span: &Span, values: &[&dyn Display]) {
        self.record_in(Severity::Warn, span, &concat(values));
    }

    pub fn error_ctx(&self, span: &Span, values: &[&dyn Display]) {
        self.record_in(Severity::Error, span, &concat(values));
    }

    /// Logs at fatal level, then exits the process with status 1.
    pub fn fatal(&self, values: &[&dyn Display]) -> ! {
        self.terminate(Severity::Fatal, concat(values))
    }

    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> ! {
        self.terminate(Severity::Fatal, args.to_string())
    }

    /// Logs at panic level, then panics with the same message.
    pub fn panic(&self, values: &[&dyn Display]) -> ! {
        self.terminate(Severity::Panic, concat(values))
    }

    pub fn panicf(&self, args: fmt::Arguments<'_>) -> ! {
        self.terminate(Severity::Panic, args.to_string())
    }

    fn terminate(&self, severity: Severity, message: String) -> ! {
        self.record(severity, &message);
        self.flush(TERMINAL_FLUSH_TIMEOUT);

        if severity == Severity::Panic {
            panic!("{}", message);
        }
        std::process::exit(1)
    }
}

impl SimpleLogger for Logger {
    fn print(&self, values: &[&dyn Display]) {
        self.record(Severity::Debug, &concat(values));
    }

    fn printf(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Debug, &args.to_string());
    }

    fn println(&self, values: &[&dyn Display]) {
        let message = values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.record(Severity::Debug, &message);
    }
}

impl MultiLevelLogger for Logger {
    fn debug(&self, values: &[&dyn Display]) {
        Logger::debug(self, values)
    }

    fn info(&self, values: &[&dyn Display]) {
        Logger::info(self, values)
    }

    fn warn(&self, values: &[&dyn Display]) {
        Logger::warn(self, values)
    }

    fn error(&self, values: &[&dyn Display]) {
        Logger::error(self, values)
    }

    fn debugf(&self, args: fmt::Arguments<'_>) {
        Logger::debugf(self, args)
    }

    fn infof(&self, args: fmt::Arguments<'_>) {
        Logger::infof(self, args)
    }

    fn warnf(&self, args: fmt::Arguments<'_>) {
        Logger::warnf(self, args)
    }

    fn errorf(&self, args: fmt::Arguments<'_>) {
        Logger::errorf(self, args)
    }
}

/// `name{fields}` of a span owned by another dispatch. The fields are only
/// known when that dispatch formats them the way a [`Logger`] does.
fn foreign_context(span: &Span) -> Option<String> {
    let name = span.metadata()?.name();
    let fields = span
        .with_subscriber(|(id, dispatch)| formatted_fields(dispatch, id))
        .flatten()
        .unwrap_or_default();

    if fields.is_empty() {
        Some(name.to_string())
    } else {
        Some(format!("{}{{{}}}", name, fields))
    }
}

fn formatted_fields(dispatch: &Dispatch, id: &Id) -> Option<String> {
    let registry = dispatch.downcast_ref::<Registry>()?;
    let span = registry.span(id)?;
    let extensions = span.extensions();
    let fields = extensions
        .get::<FormattedFields<DefaultFields>>()
        .map(|fields| fields.fields.clone());
    fields
}

/// Joins the values with no separator, numbers included: `[&1, &2]` gives
/// `12`. Callers put in their own spaces.
fn concat(values: &[&dyn Display]) -> String {
    values.iter().map(|value| value.to_string()).collect()
}

enum RemoteTarget {
    Sentry(SentryOptions),
    Sink(Arc<dyn RemoteSink>),
}

pub struct Builder {
    config: Config,
    file: Option<(PathBuf, u64, usize)>,
    compress: bool,
    remote: Option<RemoteTarget>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
            file: None,
            compress: true,
            remote: None,
        }
    }

    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    pub fn with_color(mut self, use_ansi: bool) -> Self {
        self.config.use_ansi = use_ansi;
        self
    }

    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.config.datetime_format = format.into();
        self
    }

    pub fn with_stderr_sink(self) -> Self {
        Self { file: None, ..self }
    }

    /// An empty path keeps logging on stderr.
    pub fn with_file_sink(
        self,
        path: impl Into<PathBuf>,
        max_size_mb: u64,
        max_backups: usize,
    ) -> Self {
        let path: PathBuf = path.into();
        if path.as_os_str().is_empty() {
            return self.with_stderr_sink();
        }

        Self {
            file: Some((path, max_size_mb, max_backups)),
            ..self
        }
    }

    /// Gzip rotated files, on by default.
    pub fn with_compression(self, compress: bool) -> Self {
        Self { compress, ..self }
    }

    pub fn with_sentry(self, options: SentryOptions) -> Self {
        Self {
            remote: Some(RemoteTarget::Sentry(options)),
            ..self
        }
    }

    pub fn with_remote_sink(self, sink: Arc<dyn RemoteSink>) -> Self {
        Self {
            remote: Some(RemoteTarget::Sink(sink)),
            ..self
        }
    }

    pub fn build(self) -> Logger {
        let labels = Arc::new(LevelLabels::new(self.config.use_ansi));

        let (writer, path) = match self.file {
            Some((path, max_size_mb, max_backups)) => {
                let file = RotatingFile::new(&path, max_size_mb, max_backups).compress(self.compress);
                (LogWriter::file(file), Some(path))
            }
            None => (LogWriter::Stderr, None),
        };

        let console = Logger::assemble(&self.config, labels.clone(), writer.clone(), path.clone(), None);

        let sink: Arc<dyn RemoteSink> = match self.remote {
            None => return console,
            Some(RemoteTarget::Sink(sink)) => sink,
            Some(RemoteTarget::Sentry(options)) => match SentrySink::new(&options) {
                Ok(sink) => Arc::new(sink),
                Err(err) => {
                    console.warnf(format_args!(
                        "remote reporting disabled, logging locally only: {:#}",
                        err
                    ));
                    return console;
                }
            },
        };

        Logger::assemble(&self.config, labels, writer, path, Some(sink))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
