//! Tracing setup for the command-line front end.
//!
//! Logs go to stderr by default so they never mix with answers on stdout.
//! With a log file, each startup rotates the previous files
//! (`run.log` → `run.log.1` → … → `.3`) and writes JSON lines through a
//! writer that flushes after every line.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Number of rotated log files kept next to the active one.
pub const KEEP_ROTATED_LOGS: u32 = 3;

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "local_toolcall=debug,warn"
    } else {
        "local_toolcall=warn"
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `debug`. Fails if the log file can't be opened or a
/// subscriber is already installed.
pub fn init_tracing(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let installed = match log_file {
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_target(debug)
            .try_init(),
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            }
            rotate_log_file(path, KEEP_ROTATED_LOGS);

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(FlushingWriter::new(file))
                .with_ansi(false)
                .with_target(true)
                .try_init()
        }
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_file,
        pid = std::process::id(),
        "logging initialised"
    );
    Ok(())
}

/// Rotate `base` → `base.1` → `base.2` → … → `base.{keep}`.
///
/// The oldest file beyond `keep` is deleted. Gaps in the chain are skipped.
pub fn rotate_log_file(base: &Path, keep: u32) {
    if keep == 0 {
        let _ = std::fs::remove_file(base);
        return;
    }

    let _ = std::fs::remove_file(format!("{}.{keep}", base.display()));

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base.display());
        let to = format!("{}.{}", base.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base.exists() {
        let _ = std::fs::rename(base, format!("{}.1", base.display()));
    }
}

// ─── FlushingWriter ─────────────────────────────────────────────────────────

/// A shared log file that is flushed after every write, so nothing is lost
/// if the process dies mid-run.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("lock poisoned: {e}")))?;
        let n = f.write(buf)?;
        f.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("lock poisoned: {e}")))?;
        f.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.log");
        for (suffix, body) in [("", "current"), (".1", "one"), (".2", "two"), (".3", "three")] {
            std::fs::write(format!("{}{suffix}", base.display()), body).unwrap();
        }

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |suffix: &str| {
            std::fs::read_to_string(format!("{}{suffix}", base.display())).unwrap()
        };
        assert_eq!(read(".1"), "current");
        assert_eq!(read(".2"), "one");
        assert_eq!(read(".3"), "two");
    }

    #[test]
    fn test_rotation_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.log");
        std::fs::write(&base, "current").unwrap();

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        assert!(dir.path().join("run.log.1").exists());
        assert!(!dir.path().join("run.log.2").exists());
    }

    #[test]
    fn test_flushing_writer_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let file = OpenOptions::new().create(true).append(true).open(&path).unwrap();

        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"first line\n").unwrap();
        let mut clone = writer.clone();
        clone.write_all(b"second line\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first line\nsecond line\n");
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "local_toolcall=warn");
        assert!(default_directive(true).starts_with("local_toolcall=debug"));
    }
}
