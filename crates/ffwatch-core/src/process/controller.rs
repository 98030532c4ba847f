//! The process controller.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncReadExt;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::decoder::ChunkDecoder;
use super::signal::Signal;
use super::spawner::{ChannelReader, ProcessKiller, ProcessSpawner, SpawnedProcess, TokioSpawner};
use crate::config::{TranscodeConfig, TranscoderOptions};
use crate::error::{FfwatchError, Result};
use crate::events::{EventBus, EventKind, SubscriptionId, TranscodeEvent};
use crate::outcome::{FailureKind, RunFailure, RunOutcome};
use crate::progress::{ProgressExtractor, ProgressSnapshot};
use crate::trailing::TrailingBuffer;

/// Lifecycle phase of a [`Transcoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscoderState {
    /// Never started.
    Idle,
    /// A process is live.
    Running,
    /// The last run finished, failed to spawn, or was killed.
    Terminated,
}

struct RunState {
    /// `Running` from spawn until `start()` resolves, which may be slightly
    /// after the process itself has exited.
    phase: TranscoderState,
    /// Present exactly while a process is live: cleared as soon as its exit
    /// is observed.
    handle: Option<Arc<dyn ProcessKiller>>,
    /// Sticky: set by the first accepted `stop()`, cleared only by `rearm()`.
    killed: bool,
    extractor: ProgressExtractor,
    trailing: TrailingBuffer,
}

struct Inner {
    args: Vec<String>,
    options: TranscoderOptions,
    spawner: Arc<dyn ProcessSpawner>,
    state: Mutex<RunState>,
    events: EventBus,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the process handle when a run ends, including when the `start()`
/// future is dropped mid-run.
struct RunGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        state.handle = None;
        state.phase = TranscoderState::Terminated;
    }
}

/// Wrapper around one external transcoding process at a time.
///
/// Cloning is cheap and every clone refers to the same instance, so one task
/// can await [`start`](Self::start) while another calls
/// [`stop`](Self::stop) or reads [`progress`](Self::progress).
#[derive(Clone)]
pub struct Transcoder {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Transcoder")
            .field("executable", &self.inner.options.executable)
            .field("args", &self.inner.args)
            .field("phase", &state.phase)
            .field("killed", &state.killed)
            .finish()
    }
}

impl Transcoder {
    /// Create an instance running the default executable with `args`.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_options(args, TranscoderOptions::default())
    }

    /// Create an instance with explicit options.
    pub fn with_options<I, S>(args: I, options: TranscoderOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_spawner(args, options, TokioSpawner)
    }

    /// Create an instance that starts processes through `spawner`.
    pub fn with_spawner<I, S, P>(args: I, options: TranscoderOptions, spawner: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: ProcessSpawner + 'static,
    {
        let trailing = TrailingBuffer::new(options.trailing_buffer_chars);
        Self {
            inner: Arc::new(Inner {
                args: args.into_iter().map(Into::into).collect(),
                options,
                spawner: Arc::new(spawner),
                state: Mutex::new(RunState {
                    phase: TranscoderState::Idle,
                    handle: None,
                    killed: false,
                    extractor: ProgressExtractor::new(),
                    trailing,
                }),
                events: EventBus::new(),
            }),
        }
    }

    // -- Observers ----------------------------------------------------------

    /// Whether a process is currently live.
    pub fn processing(&self) -> bool {
        self.inner.lock_state().handle.is_some()
    }

    /// Whether a termination request has been accepted.
    pub fn killed(&self) -> bool {
        self.inner.lock_state().killed
    }

    /// Copy of the current progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.lock_state().extractor.snapshot()
    }

    pub fn state(&self) -> TranscoderState {
        self.inner.lock_state().phase
    }

    /// Copy of the trailing diagnostic output for the current or last run.
    pub fn trailing_output(&self) -> String {
        self.inner.lock_state().trailing.as_str().to_string()
    }

    pub fn args(&self) -> &[String] {
        &self.inner.args
    }

    pub fn executable(&self) -> &Path {
        &self.inner.options.executable
    }

    pub fn options(&self) -> &TranscoderOptions {
        &self.inner.options
    }

    // -- Subscriptions ------------------------------------------------------

    /// Register a listener for `kind`. Listeners run synchronously, in
    /// registration order, on the task awaiting `start()`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(TranscodeEvent<'_>) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Remove a listener registered with any of the `on*` methods.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.events.off(id)
    }

    pub fn on_stdout<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Stdout, move |event| {
            if let TranscodeEvent::Stdout(chunk) = event {
                listener(chunk);
            }
        })
    }

    pub fn on_stderr<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Stderr, move |event| {
            if let TranscodeEvent::Stderr(chunk) = event {
                listener(chunk);
            }
        })
    }

    pub fn on_progress<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.on(EventKind::Progress, move |event| {
            if let TranscodeEvent::Progress(snapshot) = event {
                listener(snapshot);
            }
        })
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Run the external process to completion.
    ///
    /// Resolves once the process has exited and both output channels are
    /// drained. The process handle is cleared before this returns, so
    /// `processing()` is false by the time the caller sees the outcome.
    pub async fn start(&self) -> RunOutcome {
        let inner = &*self.inner;
        let executable = &inner.options.executable;

        let process = {
            let mut state = inner.lock_state();
            if state.phase == TranscoderState::Running {
                warn!("start() called while {} is already running", executable.display());
                return RunFailure::already_running().into();
            }

            state.trailing.clear();
            state.extractor.reset();

            let spawned = inner
                .options
                .validate()
                .and_then(|()| inner.spawner.spawn(executable, &inner.args));
            match spawned {
                Ok(process) => {
                    state.handle = Some(process.killer.clone());
                    state.phase = TranscoderState::Running;
                    process
                }
                Err(e) => {
                    state.phase = TranscoderState::Terminated;
                    warn!("{}", e);
                    return RunFailure::from(e).into();
                }
            }
        };

        let guard = RunGuard { inner };
        info!(
            "Started {} (pid {:?}) with {} argument(s)",
            executable.display(),
            process.killer.pid(),
            inner.args.len()
        );

        let result = self.drive(process).await;
        let trailing = inner.lock_state().trailing.as_str().to_string();
        drop(guard);

        let outcome = match result {
            Ok(Some(0)) => RunOutcome::Success,
            Ok(Some(code)) => RunFailure::new(FailureKind::ExitStatus, code, trailing).into(),
            Ok(None) => RunFailure::new(
                FailureKind::Signaled,
                TranscodeConfig::SENTINEL_CODE,
                trailing,
            )
            .into(),
            Err(e) => {
                warn!("{} failed mid-run: {}", executable.display(), e);
                RunFailure::from(e).into()
            }
        };

        match &outcome {
            RunOutcome::Success => info!("{} finished successfully", executable.display()),
            RunOutcome::Failure(failure) => info!(
                "{} finished with {:?} (code {})",
                executable.display(),
                failure.kind,
                failure.code
            ),
        }
        outcome
    }

    /// Request termination with the configured stop signal.
    pub fn stop(&self) -> bool {
        self.stop_with(self.inner.options.stop_signal)
    }

    /// Request termination with `signal`.
    ///
    /// Returns true only when a live, not-yet-killed process accepted the
    /// signal. Does not wait for the process to exit; the pending `start()`
    /// resolves once it has.
    pub fn stop_with(&self, signal: Signal) -> bool {
        let mut state = self.inner.lock_state();
        if state.killed {
            debug!("stop() ignored: termination already requested");
            return false;
        }
        let Some(handle) = state.handle.clone() else {
            debug!("stop() ignored: no process running");
            return false;
        };

        if handle.kill(signal) {
            state.killed = true;
            info!("Sent {} to pid {:?}", signal, handle.pid());
            true
        } else {
            false
        }
    }

    /// Clear the killed flag so a later run can be stopped again.
    ///
    /// Only allowed while no run is in progress; returns whether the flag was
    /// cleared.
    pub fn rearm(&self) -> bool {
        let mut state = self.inner.lock_state();
        if state.phase == TranscoderState::Running || !state.killed {
            return false;
        }
        state.killed = false;
        true
    }

    // -- Run loop -----------------------------------------------------------

    /// Pump both output channels and the exit future until the process has
    /// exited and both channels reached EOF, or the drain timeout elapsed
    /// after the exit.
    async fn drive(&self, process: SpawnedProcess) -> Result<Option<i32>> {
        let SpawnedProcess {
            mut stdout,
            mut stderr,
            mut exit,
            ..
        } = process;

        let chunk_size = self.inner.options.read_chunk_size;
        let mut out_buf = vec![0u8; chunk_size];
        let mut err_buf = vec![0u8; chunk_size];
        let mut out_decoder = ChunkDecoder::new();
        let mut err_decoder = ChunkDecoder::new();
        let mut exit_status: Option<Option<i32>> = None;
        let mut drain_deadline: Option<Instant> = None;

        while exit_status.is_none() || stdout.is_some() || stderr.is_some() {
            tokio::select! {
                read = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => match read {
                    Ok(0) => {
                        self.handle_stdout(&out_decoder.finish());
                        stdout = None;
                    }
                    Ok(n) => self.handle_stdout(&out_decoder.decode(&out_buf[..n])),
                    Err(e) => return Err(FfwatchError::io("reading stdout", e)),
                },
                read = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => match read {
                    Ok(0) => {
                        self.handle_stderr(&err_decoder.finish());
                        stderr = None;
                    }
                    Ok(n) => self.handle_stderr(&err_decoder.decode(&err_buf[..n])),
                    Err(e) => return Err(FfwatchError::io("reading stderr", e)),
                },
                status = &mut exit, if exit_status.is_none() => {
                    let code = status.map_err(|e| FfwatchError::io("waiting for process", e))?;
                    debug!("Process exited with code {:?}", code);
                    exit_status = Some(code);
                    self.inner.lock_state().handle = None;
                    drain_deadline = Instant::now().checked_add(self.inner.options.exit_drain_timeout);
                }
                _ = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                    warn!("Output still open after process exit; closing channels");
                    break;
                }
            }
        }

        if stdout.is_some() {
            self.handle_stdout(&out_decoder.finish());
        }
        if stderr.is_some() {
            self.handle_stderr(&err_decoder.finish());
        }

        Ok(exit_status.flatten())
    }

    fn handle_stdout(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.inner.events.emit(TranscodeEvent::Stdout(chunk));
    }

    fn handle_stderr(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.inner.events.emit(TranscodeEvent::Stderr(chunk));

        let snapshot = {
            let mut state = self.inner.lock_state();
            state.trailing.push(chunk);
            state.extractor.process_chunk(chunk)
        };
        if let Some(snapshot) = snapshot {
            self.inner.events.emit(TranscodeEvent::Progress(&snapshot));
        }
    }
}

async fn read_chunk(reader: &mut Option<ChannelReader>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader.as_mut() {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}
