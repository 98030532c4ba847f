//! Incremental progress extraction from ffmpeg's diagnostic stream.
//!
//! ffmpeg writes a banner, the input description (including a
//! `Duration: HH:MM:SS.ff` line) and then periodic status lines such as:
//!
//! ```text
//! frame=  240 fps= 60 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=2.01x
//! ```
//!
//! Chunks arrive as the pipe delivers them, so each one is scanned on its own
//! and any field found in it replaces the previous value.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::snapshot::ProgressSnapshot;

// Every value pattern needs a delimiter after the token (whitespace, a comma
// or a unit suffix), so a token cut off at the end of a chunk never matches.
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)[,\s]").expect("valid regex")
});
static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bframe=\s*(\S+)\s").expect("valid regex"));
static FPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfps=\s*(\S+)\s").expect("valid regex"));
static QUALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bq=\s*(\S+)\s").expect("valid regex"));
// Also matches the final `Lsize=` summary.
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"size=\s*(\S*?)\s*[kK]i?B\s").expect("valid regex"));
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\btime=\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)\s").expect("valid regex")
});
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bbitrate=\s*(\S+?)kbits/s").expect("valid regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bspeed=\s*(\S+?)x").expect("valid regex"));

/// Parse an `HH:MM:SS[.frac]` timestamp into seconds.
///
/// Minutes and whole seconds must have exactly two digits, so a truncated
/// `00:00:1` is rejected rather than read as one second.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let mut parts = text.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes_text = parts.next()?;
    let seconds_text = parts.next()?;
    if parts.next().is_some() || !two_digits(minutes_text) {
        return None;
    }
    let whole = seconds_text.split('.').next().unwrap_or_default();
    if !two_digits(whole) {
        return None;
    }
    let minutes: u64 = minutes_text.parse().ok()?;
    let seconds = parse_f64(seconds_text)?;
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn two_digits(text: &str) -> bool {
    text.len() == 2 && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_f64(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_u64(text: &str) -> Option<u64> {
    text.parse().ok()
}

/// Last capture of `re` in `chunk`.
fn last_capture<'a>(re: &Regex, chunk: &'a str) -> Option<&'a str> {
    re.captures_iter(chunk)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Replace `field` with the parsed last capture, leaving it alone when there
/// is no match or the captured text does not parse.
fn update_field<T>(field: &mut Option<T>, re: &Regex, chunk: &str, parse: fn(&str) -> Option<T>) {
    if let Some(value) = last_capture(re, chunk).and_then(parse) {
        *field = Some(value);
    }
}

/// Stateful parser turning diagnostic chunks into a [`ProgressSnapshot`].
#[derive(Debug, Default, Clone)]
pub struct ProgressExtractor {
    snapshot: ProgressSnapshot,
}

impl ProgressExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }

    /// Whether the total duration has been discovered for this run.
    pub fn duration_known(&self) -> bool {
        self.snapshot.duration_seconds.is_some()
    }

    /// Forget everything, including the discovered duration.
    pub fn reset(&mut self) {
        self.snapshot = ProgressSnapshot::default();
    }

    /// Feed one chunk of diagnostic text.
    ///
    /// Returns the snapshot to publish once the duration is known (even when
    /// nothing in this chunk changed it), or `None` while still waiting for
    /// the duration line. Text before the duration line is ignored entirely.
    pub fn process_chunk(&mut self, chunk: &str) -> Option<ProgressSnapshot> {
        if self.snapshot.duration_seconds.is_none() {
            self.discover_duration(chunk);
        }
        let duration = self.snapshot.duration_seconds?;

        let snap = &mut self.snapshot;
        update_field(&mut snap.frame, &FRAME_RE, chunk, parse_u64);
        update_field(&mut snap.fps, &FPS_RE, chunk, parse_f64);
        update_field(&mut snap.quality, &QUALITY_RE, chunk, parse_f64);
        update_field(&mut snap.size_kb, &SIZE_RE, chunk, parse_u64);

        if let Some(elapsed) = last_capture(&TIME_RE, chunk).and_then(parse_timestamp) {
            snap.elapsed_seconds = Some(elapsed);
            if duration > 0.0 {
                snap.percent = Some(elapsed / duration * 100.0);
            }
        }

        update_field(&mut snap.bitrate_kbps, &BITRATE_RE, chunk, parse_f64);
        update_field(&mut snap.speed, &SPEED_RE, chunk, parse_f64);

        Some(self.snapshot)
    }

    fn discover_duration(&mut self, chunk: &str) {
        let Some(caps) = DURATION_RE.captures(chunk) else {
            return;
        };
        let hours: Option<u64> = caps[1].parse().ok();
        let minutes: Option<u64> = caps[2].parse().ok();
        let seconds = parse_f64(&caps[3]);
        if let (Some(h), Some(m), Some(s)) = (hours, minutes, seconds) {
            let total = h as f64 * 3600.0 + m as f64 * 60.0 + s;
            debug!("Discovered input duration: {:.2}s", total);
            self.snapshot.duration_seconds = Some(total);
        }
    }
}
