mod formatters;
mod level;
mod logger;
mod record;
mod remote;
mod rotation;
mod sinks;

use std::{
    fmt::{self, Display},
    time::Duration,
};

pub use formatters::ConsoleFormatter;
pub use level::{LevelLabels, Severity};
pub use logger::{Builder, Config, Logger, DEFAULT_DATETIME_FORMAT};
pub use record::Record;
pub use remote::{SentryOptions, SentrySink};
pub use rotation::RotatingFile;
pub use sinks::{LogWriter, LogWriterGuard};

/// Destination for records mirrored off the console pipeline.
pub trait RemoteSink: Send + Sync {
    fn send(&self, record: &Record) -> eyre::Result<()>;

    /// Blocks until buffered records are delivered or `timeout` passes.
    /// Returns false on timeout.
    fn flush(&self, timeout: Duration) -> bool;
}

/// printf style logging, all at debug level.
pub trait SimpleLogger {
    fn print(&self, values: &[&dyn Display]);
    fn printf(&self, args: fmt::Arguments<'_>);
    /// Joins the values with single spaces.
    fn println(&self, values: &[&dyn Display]);
}

pub trait MultiLevelLogger {
    fn debug(&self, values: &[&dyn Display]);
    fn info(&self, values: &[&dyn Display]);
    fn warn(&self, values: &[&dyn Display]);
    fn error(&self, values: &[&dyn Display]);
    fn debugf(&self, args: fmt::Arguments<'_>);
    fn infof(&self, args: fmt::Arguments<'_>);
    fn warnf(&self, args: fmt::Arguments<'_>);
    fn errorf(&self, args: fmt::Arguments<'_>);
}
