//! Integration tests for the Transcoder against real processes.
//!
//! Most tests drive `sh` so they run anywhere with a POSIX shell. The last
//! test runs a real encode and is skipped when ffmpeg is not on PATH.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ffwatch_core::{
    FailureKind, ProgressSnapshot, RunOutcome, Signal, TranscodeConfig, Transcoder,
    TranscoderOptions, TranscoderState,
};
use tempfile::TempDir;

/// Fake ffmpeg: prints a banner, the input duration and two status lines.
const FAKE_FFMPEG: &str = r#"
printf 'ffmpeg version 6.1 Copyright (c) 2000-2023 the FFmpeg developers\n' >&2
printf 'Input #0, avi, from in.avi:\n  Duration: 00:00:04.00, start: 0.000000, bitrate: 1 kb/s\n' >&2
sleep 0.05
printf 'frame=   50 fps=25 q=28.0 size=     128kB time=00:00:02.00 bitrate= 524.3kbits/s speed=1.0x\r' >&2
sleep 0.05
printf 'frame=  100 fps=25 q=-1.0 Lsize=     256kB time=00:00:04.00 bitrate= 524.3kbits/s speed=1.0x\n' >&2
printf 'done\n'
"#;

fn shell(script: &str) -> Transcoder {
    Transcoder::with_options(
        ["-c", script],
        TranscoderOptions::default().with_executable("sh"),
    )
}

fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn wait_until_processing(t: &Transcoder) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !t.processing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("process never started");
}

#[tokio::test]
async fn test_fresh_instance_is_idle() {
    let t = Transcoder::new(["-version"]);
    assert!(!t.processing());
    assert!(!t.killed());
    assert_eq!(t.state(), TranscoderState::Idle);
    assert_eq!(t.progress(), ProgressSnapshot::default());
    assert_eq!(t.executable(), std::path::Path::new("ffmpeg"));
}

#[tokio::test]
async fn test_successful_run() {
    let t = shell("exit 0");
    let outcome = t.start().await;
    assert_eq!(outcome, RunOutcome::Success);
    assert!(!t.processing());
    assert_eq!(t.state(), TranscoderState::Terminated);
}

#[tokio::test]
async fn test_missing_executable_fails_to_spawn() {
    let t = Transcoder::with_options(
        ["-i", "in.mp4", "out.mp4"],
        TranscoderOptions::default().with_executable("/nonexistent/ffwatch-missing-ffmpeg"),
    );

    let failure = t.start().await.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Spawn);
    assert_eq!(failure.code, TranscodeConfig::SENTINEL_CODE);
    assert!(!failure.message.is_empty());
    assert!(!t.processing());
    assert!(!t.killed());
}

#[tokio::test]
async fn test_nonzero_exit_reports_code_and_diagnostics() {
    let t = shell("printf 'Unknown encoder foo\\n' >&2; exit 7");

    let failure = t.start().await.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::ExitStatus);
    assert_eq!(failure.code, 7);
    assert_eq!(failure.message, "Unknown encoder foo\n");
    assert_eq!(t.trailing_output(), "Unknown encoder foo\n");
}

#[tokio::test]
async fn test_stdout_is_forwarded() {
    let t = shell("printf 'hello '; printf 'world'");
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    t.on_stdout(move |chunk| sink.lock().unwrap().push_str(chunk));

    assert!(t.start().await.is_success());
    assert_eq!(*seen.lock().unwrap(), "hello world");
}

#[tokio::test]
async fn test_stop_long_running_process() {
    let t = shell("exec sleep 30");
    let runner = t.clone();
    let run = tokio::spawn(async move { runner.start().await });

    wait_until_processing(&t).await;
    assert!(t.processing());
    assert_eq!(t.state(), TranscoderState::Running);

    assert!(t.stop());
    assert!(t.killed());
    assert!(!t.stop());
    assert!(t.killed());

    let outcome = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not finish after stop")
        .unwrap();
    let failure = outcome.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Signaled);
    assert_eq!(failure.code, TranscodeConfig::SENTINEL_CODE);
    assert!(!t.processing());
    assert!(t.killed());
}

#[tokio::test]
async fn test_stop_with_custom_signal() {
    let t = Transcoder::with_options(
        ["-c", "exec sleep 30"],
        TranscoderOptions::default()
            .with_executable("sh")
            .with_stop_signal(Signal::Interrupt),
    );
    let runner = t.clone();
    let run = tokio::spawn(async move { runner.start().await });

    wait_until_processing(&t).await;
    assert!(t.stop());
    assert!(run.await.unwrap().is_failure());
}

#[tokio::test]
async fn test_exit_observed_while_grandchild_holds_pipes() {
    let t = Transcoder::with_options(
        ["-c", "sleep 4 & exit 3"],
        TranscoderOptions::default()
            .with_executable("sh")
            .with_exit_drain_timeout(Duration::from_millis(1500)),
    );
    let started = std::time::Instant::now();
    let runner = t.clone();
    let run = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!t.processing());
    assert!(!t.stop());
    assert!(!t.killed());

    let failure = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not finish after exit")
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::ExitStatus);
    assert_eq!(failure.code, 3);
    assert!(started.elapsed() < Duration::from_millis(3500));
}

#[tokio::test]
async fn test_stop_never_started() {
    let t = shell("exit 0");
    assert!(!t.stop());
    assert!(!t.killed());
}

#[tokio::test]
async fn test_progress_from_fake_ffmpeg() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let script = dir.path().join("fake-ffmpeg.sh");
    std::fs::write(&script, FAKE_FFMPEG).unwrap();

    let t = Transcoder::with_options(
        [script.to_string_lossy().into_owned()],
        TranscoderOptions::default().with_executable("sh"),
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    t.on_progress(move |snap| sink.lock().unwrap().push(*snap));
    let stdout = Arc::new(Mutex::new(String::new()));
    let out_sink = stdout.clone();
    t.on_stdout(move |chunk| out_sink.lock().unwrap().push_str(chunk));

    assert!(t.start().await.is_success());

    let events = events.lock().unwrap();
    assert!(!events.is_empty());
    assert!(events.iter().all(|s| s.duration_seconds == Some(4.0)));

    let last = t.progress();
    assert_eq!(last.duration_seconds, Some(4.0));
    assert_eq!(last.elapsed_seconds, Some(4.0));
    assert_eq!(last.percent, Some(100.0));
    assert_eq!(last.frame, Some(100));
    assert_eq!(last.size_kb, Some(256));
    assert_eq!(last.speed, Some(1.0));
    assert_eq!(*stdout.lock().unwrap(), "done\n");
}

#[tokio::test]
async fn test_real_ffmpeg_reports_progress() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }

    // lavfi sources report no duration, so render a short file first.
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("input.avi");
    let input_arg = input.to_string_lossy().into_owned();
    let prepare = Transcoder::new([
        "-y",
        "-hide_banner",
        "-f",
        "lavfi",
        "-i",
        "testsrc=duration=2:size=128x72:rate=25",
        input_arg.as_str(),
    ]);
    let prepared = prepare.start().await;
    assert!(prepared.is_success(), "prepare failed: {:?}", prepared.failure());

    let t = Transcoder::new(["-hide_banner", "-i", input_arg.as_str(), "-f", "null", "-"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    t.on_progress(move |snap| sink.lock().unwrap().push(*snap));

    let outcome = t.start().await;
    assert!(outcome.is_success(), "ffmpeg failed: {:?}", outcome.failure());

    let events = events.lock().unwrap();
    assert!(!events.is_empty());
    for snap in events.iter() {
        assert!(snap.duration_seconds.is_some());
        if let Some(percent) = snap.percent {
            assert!((0.0..=101.0).contains(&percent), "percent {percent}");
        }
    }
}
