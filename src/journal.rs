use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};

use crate::{Error, Result};

/// Name of the event log inside the storage directory
pub const JOURNAL_FILE: &str = "hue-restore.log";

/// Severity of a journal entry, mirrored onto the [log] facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Running text log of timestamped events
///
/// Every entry is appended to `hue-restore.log`, forwarded to [log],
/// and echoed to stdout when verbose.
pub struct Journal {
    file: File,
    path: PathBuf,
    verbose: bool,
}

impl Journal {
    /// Open the journal in the storage directory for appending
    pub fn open(dir: &Path, verbose: bool) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::storage("create", dir, e))?;
        let path = dir.join(JOURNAL_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage("open", &path, e))?;
        Ok(Journal {
            file,
            path,
            verbose,
        })
    }

    pub fn info(&mut self, message: &str) {
        self.record(Level::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        self.record(Level::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        self.record(Level::Error, message);
    }

    /// Journal the error of a failed step, then hand the result back
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_restore::{Error, Journal, Result};
    ///
    /// let dir = std::env::temp_dir().join(format!("hue-restore-doc-{}", std::process::id()));
    /// let mut journal = Journal::open(&dir, false).unwrap();
    ///
    /// let failed: Result<()> = Err(Error::MissingConfig("bridge address"));
    /// assert!(journal.trace("setup failed", failed).is_err());
    /// assert_eq!(journal.trace("fine", Ok(3)).unwrap(), 3);
    ///
    /// let log = std::fs::read_to_string(dir.join("hue-restore.log")).unwrap();
    /// assert!(log.contains("ERROR setup failed: "));
    /// assert!(!log.contains("fine"));
    /// # std::fs::remove_dir_all(&dir).unwrap();
    /// ```
    ///
    pub fn trace<T>(&mut self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.error(&format!("{context}: {e}"));
        }
        result
    }

    /// Append one entry
    ///
    /// Failing to write the journal never interrupts a cycle; it is
    /// reported through [log] instead.
    pub fn record(&mut self, level: Level, message: &str) {
        match level {
            Level::Info => info!("{message}"),
            Level::Warn => warn!("{message}"),
            Level::Error => error!("{message}"),
        }

        let line = format!(
            "{} {:<5} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            match level {
                Level::Info => "INFO",
                Level::Warn => "WARN",
                Level::Error => "ERROR",
            },
            message
        );

        if self.verbose {
            println!("{line}");
        }

        if let Err(e) = writeln!(self.file, "{line}") {
            error!("Failed to write journal {:?}: {:?}", self.path, e);
        }
    }
}
