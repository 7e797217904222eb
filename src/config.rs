use std::path::{Path, PathBuf};

use eyre::Context;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::logging::{Builder, Logger, SentryOptions, Severity, DEFAULT_DATETIME_FORMAT};

/// Logger settings as they appear in a consumer's configuration file.
///
/// ```json
/// {
///   "filename": "logs/app.log",
///   "max_size_mb": 10,
///   "max_backups": 5,
///   "color": false,
///   "level": "info",
///   "sentry": { "dsn": "https://key@o0.ingest.sentry.io/0", "release": "1.2.0", "environment": "prod" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub filename: Option<PathBuf>,
    pub max_size_mb: u64,
    pub max_backups: usize,
    pub color: bool,
    pub level: String,
    pub datetime_format: String,
    pub sentry: Option<SentrySettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentrySettings {
    pub dsn: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub environment: String,
    /// Lowest severity reported, `error` when unset.
    #[serde(default)]
    pub min_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filename: None,
            max_size_mb: 0,
            max_backups: 0,
            color: true,
            level: "trace".to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            sentry: None,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        serde_json::from_str(json).context("Failed parsing logger settings")
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed reading logger settings {}", path.display()))?;

        Self::from_json(&json)
    }

    pub fn builder(&self) -> eyre::Result<Builder> {
        let level: LevelFilter = self
            .level
            .parse()
            .with_context(|| format!("Unknown log level '{}'", self.level))?;

        let mut builder = Builder::new()
            .with_level(level)
            .with_color(self.color)
            .with_datetime_format(&self.datetime_format);

        if let Some(filename) = &self.filename {
            builder = builder.with_file_sink(filename, self.max_size_mb, self.max_backups);
        }

        if let Some(sentry) = &self.sentry {
            let mut options = SentryOptions::new(&sentry.dsn, &sentry.release, &sentry.environment);
            if let Some(min_level) = &sentry.min_level {
                options = options.with_min_severity(min_level.parse::<Severity>()?);
            }
            builder = builder.with_sentry(options);
        }

        Ok(builder)
    }

    pub fn build(&self) -> eyre::Result<Logger> {
        Ok(self.builder()?.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let settings = Settings::from_json("{}").unwrap();

        assert!(settings.filename.is_none());
        assert!(settings.color);
        assert_eq!(settings.level, "trace");
        assert_eq!(settings.datetime_format, DEFAULT_DATETIME_FORMAT);
        assert!(settings.sentry.is_none());
    }

    #[test]
    fn full_settings_parse() {
        let settings = Settings::from_json(
            r#"{
                "filename": "logs/app.log",
                "max_size_mb": 10,
                "max_backups": 3,
                "color": false,
                "level": "warn",
                "sentry": { "dsn": "https://key@example.com/1", "min_level": "fatal" }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.filename, Some(PathBuf::from("logs/app.log")));
        assert_eq!(settings.max_size_mb, 10);
        assert_eq!(settings.max_backups, 3);
        assert!(!settings.color);

        let sentry = settings.sentry.unwrap();
        assert_eq!(sentry.release, "");
        assert_eq!(sentry.min_level.as_deref(), Some("fatal"));
    }

    #[test]
    fn unknown_level_is_an_error() {
        let settings = Settings {
            level: "loud".to_string(),
            ..Settings::default()
        };

        let err = settings.build().err().unwrap();
        assert!(err.to_string().contains("Unknown log level 'loud'"));
    }

    #[test]
    fn unknown_remote_level_is_an_error() {
        let settings = Settings {
            sentry: Some(SentrySettings {
                dsn: "https://key@example.com/1".to_string(),
                release: String::new(),
                environment: String::new(),
                min_level: Some("loud".to_string()),
            }),
            ..Settings::default()
        };

        assert!(settings.builder().is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Settings::from_json("{ filename: ").is_err());
    }
}
