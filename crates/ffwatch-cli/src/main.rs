//! ffwatch - run ffmpeg and print live progress.
//!
//! Everything after `--` is handed to ffmpeg verbatim. ffmpeg's own output is
//! not forwarded; one line per progress update is printed to stdout instead,
//! and the trailing diagnostics are printed to stderr if the run fails.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use ffwatch_core::{ProgressSnapshot, RunOutcome, Signal, Transcoder, TranscoderOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "ffwatch")]
#[command(about = "Run ffmpeg and report live progress")]
struct Args {
    /// ffmpeg executable (defaults to $FFWATCH_FFMPEG, then `ffmpeg` on PATH)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Print progress as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    debug: bool,

    /// Signal sent on Ctrl-C or timeout
    #[arg(long, default_value = "SIGTERM")]
    stop_signal: Signal,

    /// Stop ffmpeg after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Arguments passed to ffmpeg
    #[arg(last = true, required = true)]
    ffmpeg_args: Vec<String>,
}

impl Args {
    /// `--debug` wins, then `RUST_LOG`, then `info`.
    fn log_filter(&self) -> EnvFilter {
        if self.debug {
            return EnvFilter::new("debug");
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn options(&self) -> TranscoderOptions {
        let options = TranscoderOptions::from_env().with_stop_signal(self.stop_signal);
        match &self.ffmpeg {
            Some(path) => options.with_executable(path),
            None => options,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only progress lines.
    FmtSubscriber::builder()
        .with_env_filter(args.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let transcoder = Transcoder::with_options(args.ffmpeg_args.clone(), args.options());
    debug!("Configured {:?}", transcoder);

    let json = args.json;
    transcoder.on_progress(move |snap| print_progress(snap, json));

    let watcher = transcoder.clone();
    let timeout = args.timeout.map(Duration::from_secs);
    let stopper = tokio::spawn(async move {
        let reason = match timeout {
            Some(limit) => tokio::select! {
                _ = interrupted() => "interrupted",
                _ = tokio::time::sleep(limit) => "timeout elapsed",
            },
            None => {
                interrupted().await;
                "interrupted"
            }
        };
        if watcher.stop() {
            warn!("Stopping ffmpeg: {}", reason);
        }
    });

    let outcome = transcoder.start().await;
    stopper.abort();

    match outcome {
        RunOutcome::Success => {
            info!("Done");
            Ok(())
        }
        RunOutcome::Failure(failure) => {
            eprintln!("ffwatch: {failure}");
            let code = if failure.has_exit_code() { failure.code } else { 1 };
            std::process::exit(code);
        }
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_progress(snap: &ProgressSnapshot, json: bool) {
    if !json {
        println!("{}", describe(snap));
        return;
    }
    match serde_json::to_string(snap) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Failed to serialize progress: {}", e),
    }
}

/// One human-readable status line.
fn describe(snap: &ProgressSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(percent) = snap.percent {
        parts.push(format!("{percent:5.1}%"));
    }
    if let Some(frame) = snap.frame {
        parts.push(format!("frame {frame}"));
    }
    if let Some(fps) = snap.fps {
        parts.push(format!("{fps:.1} fps"));
    }
    match (snap.elapsed_seconds, snap.duration_seconds) {
        (Some(elapsed), Some(total)) => {
            parts.push(format!("{} / {}", clock(elapsed), clock(total)))
        }
        (Some(elapsed), None) => parts.push(clock(elapsed)),
        _ => {}
    }
    if let Some(speed) = snap.speed {
        parts.push(format!("{speed:.2}x"));
    }
    // Wall-clock estimate: media time left at the current speed.
    if let (Some(remaining), Some(speed)) = (snap.remaining_seconds(), snap.speed) {
        if speed > 0.0 {
            parts.push(format!("eta {}", clock(remaining / speed)));
        }
    }

    if parts.is_empty() {
        "waiting for progress".to_string()
    } else {
        parts.join("  ")
    }
}

fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}
