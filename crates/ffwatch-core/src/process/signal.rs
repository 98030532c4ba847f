//! Termination signals understood by `Transcoder::stop_with`.

use crate::error::FfwatchError;
use std::fmt;
use std::str::FromStr;

/// Signal used to request termination of the external process.
///
/// On Unix each variant maps to the POSIX signal of the same name. Other
/// platforms have no signal delivery, so every variant becomes a forced kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    /// `SIGTERM`, the graceful default.
    #[default]
    Terminate,
    /// `SIGINT`. ffmpeg finalizes the output container on this one.
    Interrupt,
    /// `SIGKILL`.
    Kill,
    /// `SIGHUP`.
    Hangup,
    /// `SIGQUIT`.
    Quit,
}

impl Signal {
    /// Canonical `SIG*` name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Terminate => "SIGTERM",
            Signal::Interrupt => "SIGINT",
            Signal::Kill => "SIGKILL",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
        }
    }

    #[cfg(unix)]
    pub(crate) fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as Nix;
        match self {
            Signal::Terminate => Nix::SIGTERM,
            Signal::Interrupt => Nix::SIGINT,
            Signal::Kill => Nix::SIGKILL,
            Signal::Hangup => Nix::SIGHUP,
            Signal::Quit => Nix::SIGQUIT,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = FfwatchError;

    /// Accepts `SIGTERM`, `TERM` and `term` style names, plus the numeric
    /// values 1, 2, 3, 9 and 15.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" | "15" => Ok(Signal::Terminate),
            "INT" | "2" => Ok(Signal::Interrupt),
            "KILL" | "9" => Ok(Signal::Kill),
            "HUP" | "1" => Ok(Signal::Hangup),
            "QUIT" | "3" => Ok(Signal::Quit),
            _ => Err(FfwatchError::InvalidSignal(s.to_string())),
        }
    }
}
