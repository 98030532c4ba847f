use serde::{Deserialize, Serialize};

/// Point-in-time view of a transcode's progress.
///
/// Every field is `None` until the corresponding value has been seen in the
/// diagnostic stream. `percent` stays `None` until a positive duration is
/// known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Total input duration in seconds.
    pub duration_seconds: Option<f64>,
    /// `elapsed_seconds / duration_seconds * 100`. Not clamped.
    pub percent: Option<f64>,
    /// Frames encoded so far.
    pub frame: Option<u64>,
    /// Instantaneous frames per second.
    pub fps: Option<f64>,
    /// Encoder quality metric (`q=`).
    pub quality: Option<f64>,
    /// Instantaneous output bitrate in kbit/s.
    pub bitrate_kbps: Option<f64>,
    /// Output size so far in kB.
    pub size_kb: Option<u64>,
    /// Encode speed as a multiple of realtime.
    pub speed: Option<f64>,
    /// Media time encoded so far, in seconds.
    pub elapsed_seconds: Option<f64>,
}

impl ProgressSnapshot {
    /// Whether nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Media time left to encode, when both ends are known.
    pub fn remaining_seconds(&self) -> Option<f64> {
        match (self.duration_seconds, self.elapsed_seconds) {
            (Some(total), Some(done)) => Some((total - done).max(0.0)),
            _ => None,
        }
    }
}
