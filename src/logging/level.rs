use std::{borrow::Cow, fmt, str::FromStr};

use tracing::Level;
use yansi::{Condition, Paint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
        Severity::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        }
    }

    /// The `tracing` level a record of this severity is emitted at. `tracing`
    /// stops at ERROR, so fatal and panic records also carry a `severity` field.
    pub fn tracing_level(&self) -> Level {
        match self {
            Severity::Trace => Level::TRACE,
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warn => Level::WARN,
            Severity::Error | Severity::Fatal | Severity::Panic => Level::ERROR,
        }
    }

    pub(crate) fn from_tracing(level: &Level) -> Self {
        match *level {
            Level::TRACE => Severity::Trace,
            Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warn,
            _ => Severity::Error,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| eyre::eyre!("Unknown log level '{}'", s))
    }
}

/// Display labels for every severity, built once per logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLabels {
    labels: [String; 7],
}

impl LevelLabels {
    pub fn new(use_ansi: bool) -> Self {
        let labels = Severity::ALL.map(|severity| {
            let text = format!("[{}]", severity.as_str().to_uppercase());
            if use_ansi {
                paint(severity, &text)
            } else {
                text
            }
        });

        Self { labels }
    }

    pub fn label(&self, severity: Severity) -> &str {
        &self.labels[severity.index()]
    }

    /// Resolves a level name as it appears on a record. Unknown names are
    /// rendered uppercased in brackets, a missing level renders as nothing.
    pub fn resolve(&self, level: Option<&str>) -> Cow<'_, str> {
        match level {
            None => Cow::Borrowed(""),
            Some(name) => match name.parse::<Severity>() {
                Ok(severity) => Cow::Borrowed(self.label(severity)),
                Err(_) => Cow::Owned(format!("[{}]", name).to_uppercase()),
            },
        }
    }
}

fn paint(severity: Severity, text: &str) -> String {
    let painted = match severity {
        Severity::Trace => return text.to_string(),
        Severity::Debug => text.bright_blue(),
        Severity::Info => text.blue(),
        Severity::Warn => text.yellow(),
        Severity::Error => text.red(),
        Severity::Fatal => text.white().on_red(),
        Severity::Panic => text.black().on_bright_red(),
    };

    // Forced per value so the global yansi switch never decides for us.
    painted.whenever(Condition::ALWAYS).to_string()
}
