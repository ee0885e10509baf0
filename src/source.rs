//! Sequential access to stored events
//!
//! Samples are JSON Lines files holding one event row per line. Rows are
//! decoded and bound to typed [`Event`]s on the fly. Malformed rows are either
//! fatal or skipped with a warning, depending on the configured policy.

use crate::{
    config::MismatchPolicy,
    event::{Event, RawEvent, SchemaError},
    Result,
};
use eyre::{Report, WrapErr};
use std::{
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

impl MismatchPolicy {
    /// React to a malformed event: abort the run, or warn and carry on
    pub fn handle(self, error: SchemaError, location: impl Display) -> Result<()> {
        match self {
            Self::Abort => {
                Err(Report::new(error).wrap_err(format!("Malformed event at {location}")))
            }
            Self::Skip => {
                log::warn!("Skipping malformed event at {location}: {error}");
                Ok(())
            }
        }
    }
}

/// Reader of one event sample
#[derive(Debug)]
pub struct EventSource {
    /// Location of the sample
    path: PathBuf,

    /// Remaining rows
    lines: Lines<BufReader<File>>,

    /// Number of the last row read (1-based)
    line_no: usize,

    /// What to do with malformed rows
    policy: MismatchPolicy,

    /// Number of rows skipped since the last rewind
    skipped: usize,
}
//
impl EventSource {
    /// Open a sample, failing if it cannot be read
    pub fn open(path: impl AsRef<Path>, policy: MismatchPolicy) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let lines = Self::lines(&path)?;
        log::debug!("Opened event source {}", path.display());
        Ok(Self {
            path,
            lines,
            line_no: 0,
            policy,
            skipped: 0,
        })
    }

    fn lines(path: &Path) -> Result<Lines<BufReader<File>>> {
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open event source {}", path.display()))?;
        Ok(BufReader::new(file).lines())
    }

    /// Location of the sample
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the sample, i.e. the file name without its extension
    pub fn sample_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Policy applied to malformed rows
    pub fn policy(&self) -> MismatchPolicy {
        self.policy
    }

    /// Number of rows skipped since the sample was (re)opened
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Location of the last row read, for diagnostics
    pub fn location(&self) -> String {
        format!("{}:{}", self.path.display(), self.line_no)
    }

    /// Go back to the first event
    pub fn rewind(&mut self) -> Result<()> {
        self.lines = Self::lines(&self.path)?;
        self.line_no = 0;
        self.skipped = 0;
        Ok(())
    }

    /// Read the next well-formed event, if any
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        while let Some(line) = self.lines.next() {
            self.line_no += 1;
            let line = line.wrap_err_with(|| format!("Failed to read {}", self.location()))?;
            if line.trim().is_empty() {
                continue;
            }
            match decode(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(error) => {
                    self.policy.handle(error, self.location())?;
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }
}

/// Decode one row and bind it to a typed event
pub fn decode(line: &str) -> Result<Event, SchemaError> {
    let raw: RawEvent =
        serde_json::from_str(line).map_err(|e| SchemaError::Undecodable(e.to_string()))?;
    Event::bind(raw)
}
