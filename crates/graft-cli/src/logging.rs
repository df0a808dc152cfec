//! Logging setup
//!
//! Human-readable events go to stderr, filtered by `RUST_LOG` (default
//! `info`). Once the run label is known, the same events are also written
//! to `<log_dir>/<run_label>.log` at debug level.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log file attached after startup; writes are dropped until then
#[derive(Debug, Clone, Default)]
pub(crate) struct LogFile {
    inner: Arc<Mutex<Option<(PathBuf, File)>>>,
}

impl LogFile {
    /// Create `path` (and its directory) and start mirroring events into it
    pub(crate) fn attach(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some((path.to_path_buf(), file));
        Ok(())
    }

    /// Path of the attached file
    pub(crate) fn path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(path, _)| path.clone())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some((_, file)) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber
///
/// `verbose` lowers the stderr default to debug; `RUST_LOG` still wins.
pub(crate) fn init(verbose: bool) -> Result<LogFile> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let log_file = LogFile::default();

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(log_file.clone())
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .context("installing the tracing subscriber")?;
    Ok(log_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_dropped_until_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let mut log = LogFile::default();
        log.write_all(b"early\n").unwrap();
        assert_eq!(log.path(), None);

        log.attach(&path).unwrap();
        log.write_all(b"late\n").unwrap();
        log.flush().unwrap();
        assert_eq!(log.path(), Some(path.clone()));
        assert_eq!(fs::read_to_string(path).unwrap(), "late\n");
    }
}
