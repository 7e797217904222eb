mod args;

use clap::Parser;
use std::process::ExitCode;
use zlogger::{Logger, Settings, SimpleLogger};

use crate::args::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Err(err) => {
            let root = err.root_cause();

            eprint!("\x1b[31m");
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Caused by:");
            eprint!("  {}", root);
            eprintln!("\x1b[0m");
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::from(0),
    }
}

fn run(args: Args) -> eyre::Result<()> {
    let logger = match &args.config {
        Some(path) => Settings::load(path)?.build()?,
        None => args.builder().build(),
    };

    write_sample(&logger);

    if args.rotate {
        logger.rotate()?;
        logger.info(&[&"rotated log file"]);
    }

    if !logger.flush(args.flush_timeout) {
        logger.warnf(format_args!(
            "remote reporting did not drain within {}",
            humantime::format_duration(args.flush_timeout)
        ));
    }

    Ok(())
}

fn write_sample(logger: &Logger) {
    let destination = logger
        .log_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stderr".to_string());
    let remote = if logger.remote().is_some() { "on" } else { "off" };

    logger.debugf(format_args!("zlogger {}", env!("CARGO_PKG_VERSION")));
    logger.info(&[&"writing to ", &destination]);
    logger.warn(&[&"remote reporting ", &remote]);
    logger.errorf(format_args!("{}={}", "sample_error", 1));
    logger.println(&[&"print", &"joins", &"with", &"spaces"]);

    let span = logger.in_scope(|| tracing::info_span!("sample", pid = std::process::id()));
    logger.info_ctx(&span, &[&"inside a span"]);

    logger.in_scope(|| tracing::info!(answer = 42, "structured fields"));
}
