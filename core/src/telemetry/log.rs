use crate::prelude::DoaResult;
use crate::wire::{format_angle, session_stamp};
use chrono::Local;
use log::info;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// First line of every session log.
pub const LOG_HEADER: &str = "time, doa_max_str, result";

/// Append-only log for one producer run.
///
/// Nothing touches the filesystem until the first append; that call creates
/// the directory and the file, writes the header if the file is empty, and
/// keeps the handle.
pub struct SessionLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl SessionLog {
    /// Names the log after the current local time.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_stamp(dir, &session_stamp(&Local::now()))
    }

    pub fn with_stamp(dir: impl AsRef<Path>, stamp: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("doa_log_{stamp}.txt")),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `<ts>, <angle>, <result>`.
    pub fn append_measurement(&self, timestamp: &str, angle: f64, result: &str) -> DoaResult<()> {
        self.write_line(&format!("{timestamp}, {}, {result}", format_angle(angle)))
    }

    /// Records a failed network send inline with the measurements.
    pub fn annotate_send_error(
        &self,
        timestamp: &str,
        label: &str,
        err: &dyn Display,
    ) -> DoaResult<()> {
        self.write_line(&format!("{timestamp}, {label}: {err}"))
    }

    fn write_line(&self, line: &str) -> DoaResult<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.create()?);
        }
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        Ok(())
    }

    fn create(&self) -> DoaResult<File> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{LOG_HEADER}")?;
        }
        info!("session log created at {}", self.path.display());
        Ok(file)
    }
}
