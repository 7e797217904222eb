use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const MEGABYTE: usize = 1024 * 1024;
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// A log file that rotates itself once it grows past a size threshold.
///
/// Rotation is done by [`FileRotate`]: the active file is moved aside to
/// `<file>.<timestamp>`, gzip compressed unless disabled, and old backups are
/// pruned down to `max_backups` (0 keeps all of them).
///
/// Nothing touches the disk until the first write or rotation, so building one
/// never fails; an unusable path shows up as an I/O error at that point.
pub struct RotatingFile {
    file_path: PathBuf,
    max_bytes: usize,
    max_backups: usize,
    compress: bool,
    inner: Option<FileRotate<AppendTimestamp>>,
}

impl RotatingFile {
    /// `max_size_mb` of 0 falls back to 100 MB.
    pub fn new(path: impl Into<PathBuf>, max_size_mb: u64, max_backups: usize) -> Self {
        let max_size_mb = if max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            max_size_mb
        };
        let max_bytes = usize::try_from(max_size_mb)
            .map(|mb| mb.saturating_mul(MEGABYTE))
            .unwrap_or(usize::MAX);

        Self::with_max_bytes(path, max_bytes, max_backups)
    }

    pub fn with_max_bytes(path: impl Into<PathBuf>, max_bytes: usize, max_backups: usize) -> Self {
        Self {
            file_path: path.into(),
            max_bytes: max_bytes.max(1),
            max_backups,
            compress: true,
            inner: None,
        }
    }

    pub fn compress(self, compress: bool) -> Self {
        Self { compress, ..self }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Moves the active file aside as a backup and starts a new one, whatever
    /// its current size.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.active()?.rotate()
    }

    fn active(&mut self) -> io::Result<&mut FileRotate<AppendTimestamp>> {
        if self.inner.is_none() {
            self.inner = Some(self.open()?);
        }

        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }

    // FileRotate swallows open failures, so surface them here first.
    fn open(&self) -> io::Result<FileRotate<AppendTimestamp>> {
        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let backups = match self.max_backups {
            0 => FileLimit::Unlimited,
            max => FileLimit::MaxFiles(max),
        };
        let compression = if self.compress {
            Compression::OnRotate(0)
        } else {
            Compression::None
        };

        Ok(FileRotate::new(
            &self.file_path,
            AppendTimestamp::default(backups),
            ContentLimit::BytesSurpassed(self.max_bytes),
            compression,
            #[cfg(unix)]
            None,
        ))
    }
}

impl fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFile")
            .field("file_path", &self.file_path)
            .field("max_bytes", &self.max_bytes)
            .field("max_backups", &self.max_backups)
            .field("compress", &self.compress)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.active()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
