//! The result of a single `Transcoder::start` call.

use crate::config::TranscodeConfig;
use crate::error::FfwatchError;
use std::fmt;

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// `start()` was called while a process was already live.
    AlreadyRunning,
    /// The executable could not be started.
    Spawn,
    /// The process exited with a non-zero status code.
    ExitStatus,
    /// The process was terminated by a signal and reported no exit code.
    Signaled,
    /// An output channel or the exit wait failed mid-run.
    Runtime,
}

/// Failure details for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub kind: FailureKind,
    /// Exit code, or [`TranscodeConfig::SENTINEL_CODE`] when there is none.
    pub code: i32,
    /// Trailing diagnostic output for exit failures, otherwise the error text.
    pub message: String,
}

impl RunFailure {
    pub fn new(kind: FailureKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn already_running() -> Self {
        Self::new(
            FailureKind::AlreadyRunning,
            TranscodeConfig::SENTINEL_CODE,
            "a process is still running for this instance",
        )
    }

    /// Whether `code` is a real exit code rather than the sentinel.
    pub fn has_exit_code(&self) -> bool {
        self.kind == FailureKind::ExitStatus
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::ExitStatus => {
                write!(f, "process exited with status {}", self.code)?;
            }
            FailureKind::Signaled => f.write_str("process terminated by signal")?,
            FailureKind::AlreadyRunning => f.write_str("process already started")?,
            FailureKind::Spawn => f.write_str("failed to start process")?,
            FailureKind::Runtime => f.write_str("process error")?,
        }
        let message = self.message.trim();
        if !message.is_empty() {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RunFailure {}

impl From<FfwatchError> for RunFailure {
    fn from(err: FfwatchError) -> Self {
        let kind = match err {
            FfwatchError::Spawn { .. } | FfwatchError::Config { .. } => FailureKind::Spawn,
            _ => FailureKind::Runtime,
        };
        RunFailure::new(kind, TranscodeConfig::SENTINEL_CODE, err.to_string())
    }
}

/// Outcome of a run: success with no payload, or a [`RunFailure`].
///
/// Callers must branch on the variant explicitly; there is no implicit
/// conversion to `bool`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a run outcome reports whether the process succeeded"]
pub enum RunOutcome {
    Success,
    Failure(RunFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failure(_))
    }

    /// Failure details, if the run failed.
    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunOutcome::Success => None,
            RunOutcome::Failure(failure) => Some(failure),
        }
    }

    /// Convert into a standard `Result` for `?` propagation.
    pub fn into_result(self) -> std::result::Result<(), RunFailure> {
        match self {
            RunOutcome::Success => Ok(()),
            RunOutcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<RunFailure> for RunOutcome {
    fn from(failure: RunFailure) -> Self {
        RunOutcome::Failure(failure)
    }
}
