//! Leveled console logging with optional size based file rotation and error
//! reporting to Sentry.
//!
//! ```no_run
//! use zlogger::Logger;
//!
//! let logger = Logger::new("logs/app.log", 10, 5, false);
//! logger.info(&[&"listening on port ", &8080]);
//! logger.errorf(format_args!("{}={}", "retries", 5));
//! ```

mod config;
pub mod logging;

pub use config::{SentrySettings, Settings};
pub use logging::{
    Builder, Config, LevelLabels, Logger, MultiLevelLogger, Record, RemoteSink, SentryOptions,
    Severity, SimpleLogger,
};
