//! Centralized configuration for ffwatch.
//!
//! Constants live on [`TranscodeConfig`]; per-instance settings are carried by
//! [`TranscoderOptions`].

use crate::error::{FfwatchError, Result};
use crate::process::Signal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Library-wide defaults.
pub struct TranscodeConfig;

impl TranscodeConfig {
    /// Executable used when no path is configured, resolved through `PATH`.
    pub const DEFAULT_EXECUTABLE: &'static str = "ffmpeg";
    /// Environment variable that overrides the executable in `from_env`.
    pub const EXECUTABLE_ENV_VAR: &'static str = "FFWATCH_FFMPEG";
    /// Maximum characters of diagnostic output kept for failure messages.
    pub const TRAILING_BUFFER_CHARS: usize = 32_000;
    /// Bytes requested per read from a child output channel.
    pub const READ_CHUNK_SIZE: usize = 8192;
    /// Exit code reported when the process gave none.
    pub const SENTINEL_CODE: i32 = -1;
    /// How long output is still read after the process has exited. Pipes
    /// inherited by a surviving grandchild would otherwise never reach EOF.
    pub const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Settings for a single [`Transcoder`](crate::Transcoder) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderOptions {
    /// Path (or bare name) of the executable to run.
    pub executable: PathBuf,
    /// Character cap for the trailing diagnostic buffer.
    pub trailing_buffer_chars: usize,
    /// Read size for stdout/stderr.
    pub read_chunk_size: usize,
    /// Signal sent by `Transcoder::stop`.
    pub stop_signal: Signal,
    /// Grace period for draining stdout/stderr once the process has exited.
    pub exit_drain_timeout: Duration,
}

impl Default for TranscoderOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(TranscodeConfig::DEFAULT_EXECUTABLE),
            trailing_buffer_chars: TranscodeConfig::TRAILING_BUFFER_CHARS,
            read_chunk_size: TranscodeConfig::READ_CHUNK_SIZE,
            stop_signal: Signal::Terminate,
            exit_drain_timeout: TranscodeConfig::EXIT_DRAIN_TIMEOUT,
        }
    }
}

impl TranscoderOptions {
    /// Defaults, with the executable taken from `FFWATCH_FFMPEG` when set.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(TranscodeConfig::EXECUTABLE_ENV_VAR))
    }

    fn from_env_value(value: Option<std::ffi::OsString>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self::default().with_executable(path),
            _ => Self::default(),
        }
    }

    /// Set the executable path.
    pub fn with_executable(mut self, path: impl AsRef<Path>) -> Self {
        self.executable = path.as_ref().to_path_buf();
        self
    }

    /// Set the trailing buffer capacity in characters.
    pub fn with_trailing_buffer_chars(mut self, chars: usize) -> Self {
        self.trailing_buffer_chars = chars;
        self
    }

    /// Set the per-read chunk size in bytes.
    pub fn with_read_chunk_size(mut self, bytes: usize) -> Self {
        self.read_chunk_size = bytes;
        self
    }

    /// Set the default signal used by `stop()`.
    pub fn with_stop_signal(mut self, signal: Signal) -> Self {
        self.stop_signal = signal;
        self
    }

    /// Set how long output is drained after the process exits.
    pub fn with_exit_drain_timeout(mut self, timeout: Duration) -> Self {
        self.exit_drain_timeout = timeout;
        self
    }

    /// Reject settings that cannot produce a working instance.
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(FfwatchError::Config {
                message: "executable path must not be empty".to_string(),
            });
        }
        if self.read_chunk_size == 0 {
            return Err(FfwatchError::Config {
                message: "read_chunk_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TranscoderOptions::default();
        assert_eq!(opts.executable, PathBuf::from("ffmpeg"));
        assert_eq!(opts.trailing_buffer_chars, 32_000);
        assert_eq!(opts.read_chunk_size, 8192);
        assert_eq!(opts.stop_signal, Signal::Terminate);
        assert_eq!(opts.exit_drain_timeout, Duration::from_secs(2));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        let opts = TranscoderOptions::from_env_value(Some("/opt/ffmpeg/bin/ffmpeg".into()));
        assert_eq!(opts.executable, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));

        let opts = TranscoderOptions::from_env_value(Some("".into()));
        assert_eq!(opts.executable, PathBuf::from("ffmpeg"));

        let opts = TranscoderOptions::from_env_value(None);
        assert_eq!(opts.executable, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_builder() {
        let opts = TranscoderOptions::default()
            .with_executable("/usr/local/bin/ffmpeg")
            .with_trailing_buffer_chars(100)
            .with_read_chunk_size(512)
            .with_stop_signal(Signal::Kill)
            .with_exit_drain_timeout(Duration::from_millis(250));
        assert_eq!(opts.exit_drain_timeout, Duration::from_millis(250));
        assert_eq!(opts.executable, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(opts.trailing_buffer_chars, 100);
        assert_eq!(opts.read_chunk_size, 512);
        assert_eq!(opts.stop_signal, Signal::Kill);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(TranscoderOptions::default()
            .with_executable("")
            .validate()
            .is_err());
        assert!(TranscoderOptions::default()
            .with_read_chunk_size(0)
            .validate()
            .is_err());
    }
}
