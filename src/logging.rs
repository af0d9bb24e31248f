//! Diagnostic logging setup and the optional conversation transcript.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "CARDCHAT_LOG";

/// Installs the global `tracing` subscriber. Output goes to stderr so that
/// streamed replies on stdout stay clean. `default_directive` applies when
/// neither `CARDCHAT_LOG` nor `RUST_LOG` is set.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A subscriber may already be installed (tests, embedding callers).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}

/// Appends conversation turns to a plain-text file.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    /// A transcript that writes nothing.
    pub fn disabled() -> Self {
        Self { file_path: None }
    }

    /// Opens (creating if needed) `path` for appending. Fails early when the
    /// file cannot be written.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file_path: Some(path),
        })
    }

    pub fn from_option(path: Option<PathBuf>) -> io::Result<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn log_user(&self, content: &str) -> io::Result<()> {
        self.append(&format!("You: {content}"))
    }

    pub fn log_assistant(&self, content: &str) -> io::Result<()> {
        if content.trim().is_empty() {
            return Ok(());
        }
        self.append(content)
    }

    /// Card action outcomes and errors, marked so they stand apart from turns.
    pub fn log_note(&self, content: &str) -> io::Result<()> {
        self.append(&format!("## {content}"))
    }

    fn append(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries.
        writeln!(writer)?;
        writer.flush()
    }
}
