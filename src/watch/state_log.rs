use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::Context;

use crate::foundation::error::{MaskError, MaskResult};

/// Frame number per sequence slot as read from one state line; 0 means inactive.
pub type RawState = Vec<i64>;

const TAIL_WINDOW: u64 = 4096;

/// Result of one [`StateLog::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The log file does not exist (or its metadata is unreadable).
    Missing,
    /// Modification time equals the one seen by the previous poll.
    Unmodified,
    /// The trailing line could not be read or is not an integer list.
    Malformed(String),
    /// The trailing line has no active slot (empty or all zeros).
    Inactive,
    /// The trailing line equals the last reported state.
    Duplicate,
    /// A new state; it becomes the last reported state.
    Changed(RawState),
}

impl PollOutcome {
    /// True only for [`PollOutcome::Changed`].
    pub fn changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    /// The new state, if any.
    pub fn into_state(self) -> Option<RawState> {
        match self {
            Self::Changed(state) => Some(state),
            _ => None,
        }
    }
}

/// Change detector over an append-only state log.
///
/// Only the last non-empty line is meaningful. The stored modification time is updated every
/// time a parse is attempted, whatever its outcome, so a bad trailing line is not re-read until
/// the file changes again.
#[derive(Clone, Debug)]
pub struct StateLog {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    last_state: Option<RawState>,
}

impl StateLog {
    /// Watcher for `path`; nothing has been reported yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            last_state: None,
        }
    }

    /// Watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last state reported as [`PollOutcome::Changed`].
    pub fn last_state(&self) -> Option<&[i64]> {
        self.last_state.as_deref()
    }

    /// Check the log once.
    pub fn poll(&mut self) -> PollOutcome {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %err, "state log metadata unreadable");
                }
                return PollOutcome::Missing;
            }
        };
        if self.last_modified == Some(modified) {
            return PollOutcome::Unmodified;
        }
        self.last_modified = Some(modified);

        let state = match read_last_line(&self.path).and_then(|line| {
            let line = line.ok_or_else(|| MaskError::state_parse("state log has no lines"))?;
            parse_state_line(&line)
        }) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "state line ignored");
                return PollOutcome::Malformed(err.to_string());
            }
        };

        if state.iter().all(|v| *v == 0) {
            tracing::debug!(?state, "no active sequence");
            return PollOutcome::Inactive;
        }
        if self.last_state.as_ref() == Some(&state) {
            return PollOutcome::Duplicate;
        }

        self.last_state = Some(state.clone());
        PollOutcome::Changed(state)
    }
}

/// Parse a textual integer list such as `[0, 3, 0, 7]`.
///
/// A parenthesized `(0, 3)` form and one trailing comma after the last item are accepted too.
pub fn parse_state_line(line: &str) -> MaskResult<RawState> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| {
            trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
        });
    let normalized = match inner {
        Some(inner) => {
            let inner = inner.trim_end();
            let inner = match inner.strip_suffix(',') {
                Some(items) if !items.trim().is_empty() => items,
                _ => inner,
            };
            format!("[{inner}]")
        }
        None => trimmed.to_string(),
    };
    serde_json::from_str(&normalized)
        .map_err(|e| MaskError::state_parse(format!("'{trimmed}': {e}")))
}

/// Last non-empty line of `path`, trimmed; `None` for a blank file.
///
/// Reads backwards from the end in growing windows, so cost follows the line length rather than
/// the file length.
pub fn read_last_line(path: &Path) -> MaskResult<Option<String>> {
    let mut file =
        File::open(path).with_context(|| format!("open state log '{}'", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat state log '{}'", path.display()))?
        .len();

    let mut window = TAIL_WINDOW.min(len);
    loop {
        file.seek(SeekFrom::Start(len - window))
            .with_context(|| format!("seek state log '{}'", path.display()))?;
        let mut buf = Vec::with_capacity(window as usize);
        (&mut file)
            .take(window)
            .read_to_end(&mut buf)
            .with_context(|| format!("read state log '{}'", path.display()))?;

        let text = String::from_utf8_lossy(&buf);
        let body = text.trim_end();
        if let Some(pos) = body.rfind('\n') {
            return Ok(Some(body[pos + 1..].trim().to_string()));
        }
        if window == len {
            let line = body.trim();
            return Ok((!line.is_empty()).then(|| line.to_string()));
        }
        window = (window * 2).min(len);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/watch/state_log.rs"]
mod tests;
