//! Logging setup for the pickup board binary.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "pickup=info,pickup_db=info";
const DEBUG_LOG_FILTER: &str = "pickup=debug,pickup_db=debug";

/// Default rotation size for the log file (10 MiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of rotated files kept next to the live one.
pub const DEFAULT_BACKUP_COUNT: usize = 5;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_file: PathBuf,
    pub max_size: u64,
    pub backup_count: usize,
    pub debug: bool,
}

impl LogConfig {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            max_size: DEFAULT_MAX_LOG_SIZE,
            backup_count: DEFAULT_BACKUP_COUNT,
            debug: false,
        }
    }
}

/// Initialize tracing with a size-rotated file writer and stderr output.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let file_writer =
        SharedRollingWriter::new(&config.log_file, config.max_size, config.backup_count)
            .with_context(|| {
                format!("Failed to open log file {}", config.log_file.display())
            })?;

    let default_filter = if config.debug {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let console_filter = file_filter.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Size-rotated log file: `app.log`, `app.log.1` (newest backup) .. `app.log.N`.
struct RollingFileAppender {
    path: PathBuf,
    backup_count: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFileAppender {
    fn new(path: &Path, max_size: u64, backup_count: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut appender = Self {
            path: path.to_path_buf(),
            backup_count,
            max_size: max_size.max(1),
            file: None,
            current_size: 0,
        };
        let (file, size) = appender.open_current_file()?;
        appender.file = Some(file);
        appender.current_size = size;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn open_current_file(&self) -> io::Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        if self.backup_count == 0 {
            // No backups: start the live file over.
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            self.rotate_files()?;
        }

        let (file, size) = self.open_current_file()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }

    fn rotate_files(&self) -> io::Result<()> {
        let oldest = self.rotated_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for idx in (1..self.backup_count).rev() {
            let src = self.rotated_path(idx);
            if src.exists() {
                fs::rename(&src, self.rotated_path(idx + 1))?;
            }
        }

        if self.path.exists() {
            fs::rename(&self.path, self.rotated_path(1))?;
        }

        Ok(())
    }
}

impl Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl SharedRollingWriter {
    fn new(path: &Path, max_size: u64, backup_count: usize) -> io::Result<Self> {
        let appender = RollingFileAppender::new(path, max_size, backup_count)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

struct SharedRollingWriterGuard {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedRollingWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedRollingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_rotates_when_size_exceeded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let mut appender = RollingFileAppender::new(&path, 10, 2).unwrap();

        appender.write_all(b"first-line").unwrap();
        appender.write_all(b"second").unwrap();
        appender.flush().unwrap();

        assert_eq!(read(&path), "second");
        assert_eq!(read(&tmp.path().join("app.log.1")), "first-line");
    }

    #[test]
    fn test_keeps_at_most_backup_count_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let mut appender = RollingFileAppender::new(&path, 4, 2).unwrap();

        for chunk in [b"aaaa", b"bbbb", b"cccc", b"dddd"] {
            appender.write_all(chunk).unwrap();
        }
        appender.flush().unwrap();

        assert_eq!(read(&path), "dddd");
        assert_eq!(read(&tmp.path().join("app.log.1")), "cccc");
        assert_eq!(read(&tmp.path().join("app.log.2")), "bbbb");
        assert!(!tmp.path().join("app.log.3").exists());
    }

    #[test]
    fn test_zero_backups_truncates_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let mut appender = RollingFileAppender::new(&path, 4, 0).unwrap();

        appender.write_all(b"aaaa").unwrap();
        appender.write_all(b"bb").unwrap();
        appender.flush().unwrap();

        assert_eq!(read(&path), "bb");
        assert!(!tmp.path().join("app.log.1").exists());
    }

    #[test]
    fn test_reopen_appends_to_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("app.log");
        {
            let mut appender = RollingFileAppender::new(&path, 100, 1).unwrap();
            appender.write_all(b"one ").unwrap();
        }
        let mut appender = RollingFileAppender::new(&path, 100, 1).unwrap();
        appender.write_all(b"two").unwrap();
        appender.flush().unwrap();

        assert_eq!(read(&path), "one two");
    }
}
