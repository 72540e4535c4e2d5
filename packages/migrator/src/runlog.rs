//! Per-run log artifact.
//!
//! Every run appends an operator-readable transcript to
//! `<log_dir>/<run-uuid>.log`. Lines are mirrored to `tracing` so the same
//! story shows up in structured logs and in the file an operator tails.

use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

pub struct RunLog {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl RunLog {
    pub fn open(dir: &Path, run_id: Uuid) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = dir.join(format!("{run_id}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open run log {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, line: impl AsRef<str>) {
        tracing::info!("{}", line.as_ref());
        self.append("INFO", line.as_ref());
    }

    pub fn warn(&self, line: impl AsRef<str>) {
        tracing::warn!("{}", line.as_ref());
        self.append("WARN", line.as_ref());
    }

    pub fn error(&self, line: impl AsRef<str>) {
        tracing::error!("{}", line.as_ref());
        self.append("ERROR", line.as_ref());
    }

    // A failed log write never fails the run.
    fn append(&self, level: &str, line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(
                writer,
                "[{}] {} {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
                level,
                line
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_levelled_lines() {
        let dir = std::env::temp_dir().join(format!("runlog-test-{}", Uuid::new_v4()));
        let run_id = Uuid::new_v4();

        let log = RunLog::open(&dir, run_id).unwrap();
        log.info("starting");
        log.warn("something odd");
        log.error("something bad");

        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("INFO starting"));
        assert!(contents.contains("WARN something odd"));
        assert!(contents.contains("ERROR something bad"));
        assert_eq!(contents.lines().count(), 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reopen_appends_to_existing_file() {
        let dir = std::env::temp_dir().join(format!("runlog-test-{}", Uuid::new_v4()));
        let run_id = Uuid::new_v4();

        RunLog::open(&dir, run_id).unwrap().info("first");
        RunLog::open(&dir, run_id).unwrap().info("second");

        let contents = fs::read_to_string(dir.join(format!("{run_id}.log"))).unwrap();
        assert_eq!(contents.lines().count(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }
}
