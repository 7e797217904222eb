use std::{
    io::{self, Write},
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

use super::rotation::RotatingFile;

/// The primary byte stream a logger's console lines are written to.
#[derive(Debug, Clone)]
pub enum LogWriter {
    Stderr,
    File(Arc<Mutex<RotatingFile>>),
}

impl LogWriter {
    pub fn file(file: RotatingFile) -> Self {
        LogWriter::File(Arc::new(Mutex::new(file)))
    }

    pub fn rotating_file(&self) -> Option<&Arc<Mutex<RotatingFile>>> {
        match self {
            LogWriter::Stderr => None,
            LogWriter::File(file) => Some(file),
        }
    }
}

pub enum LogWriterGuard<'a> {
    Stderr(io::StderrLock<'static>),
    File(MutexGuard<'a, RotatingFile>),
}

impl Write for LogWriterGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriterGuard::Stderr(stderr) => stderr.write(buf),
            LogWriterGuard::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            LogWriterGuard::Stderr(stderr) => stderr.write_all(buf),
            LogWriterGuard::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriterGuard::Stderr(stderr) => stderr.flush(),
            LogWriterGuard::File(file) => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            LogWriter::Stderr => LogWriterGuard::Stderr(io::stderr().lock()),
            LogWriter::File(file) => LogWriterGuard::File(file.lock()),
        }
    }
}
