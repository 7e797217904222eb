use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;
use zlogger::{Builder, SentryOptions};

#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Writes a sample of records through a zlogger pipeline.", long_about = None)]
pub struct Args {
    #[arg(short, long, value_name = "PATH", help = "Log to a rotating file instead of stderr.")]
    pub file: Option<PathBuf>,

    #[arg(long, default_value_t = 0, help = "Size in MB that triggers a rotation, 0 for 100 MB.")]
    pub max_size: u64,

    #[arg(long, default_value_t = 0, help = "Rotated files to keep, 0 keeps all of them.")]
    pub max_backups: usize,

    #[arg(long)]
    pub no_color: bool,

    #[arg(short, long, default_value_t = LevelFilter::TRACE)]
    pub level: LevelFilter,

    #[arg(long, help = "Report error records to this Sentry DSN.")]
    pub dsn: Option<String>,

    #[arg(long, default_value = "")]
    pub release: String,

    #[arg(long, default_value = "development")]
    pub environment: String,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Read logger settings from a JSON file, ignoring the flags above."
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_parser = parse_timeout, default_value = "2s")]
    pub flush_timeout: Duration,

    #[arg(long, help = "Rotate the log file once the sample is written.")]
    pub rotate: bool,
}

impl Args {
    pub fn builder(&self) -> Builder {
        let mut builder = Builder::new()
            .with_level(self.level)
            .with_color(!self.no_color);

        if let Some(file) = &self.file {
            builder = builder.with_file_sink(file, self.max_size, self.max_backups);
        }

        if let Some(dsn) = &self.dsn {
            builder = builder.with_sentry(SentryOptions::new(dsn, &self.release, &self.environment));
        }

        builder
    }
}

fn parse_timeout(timeout: &str) -> eyre::Result<Duration> {
    let duration = humantime::parse_duration(timeout)?;
    Ok(duration)
}
