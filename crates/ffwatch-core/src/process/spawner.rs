//! Process-spawning seam.
//!
//! The controller never touches `tokio::process` directly; it asks a
//! [`ProcessSpawner`] for a [`SpawnedProcess`] and works with the byte
//! channels, exit future and [`ProcessKiller`] it hands back. Tests swap in a
//! scripted spawner; production uses [`TokioSpawner`].

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

#[cfg(not(unix))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::AsyncRead;
#[cfg(unix)]
use tokio::process::Child;
use tokio::process::Command;
use tracing::{debug, warn};

use super::signal::Signal;
use crate::error::{FfwatchError, Result};

/// Readable byte channel from the child (stdout or stderr).
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves when the process exits: `Some(code)` for a normal exit, `None`
/// when it was terminated by a signal.
pub type ExitFuture = BoxFuture<'static, std::io::Result<Option<i32>>>;

/// Delivers termination requests to a live process.
pub trait ProcessKiller: Send + Sync {
    /// OS process id, if the platform exposes one.
    fn pid(&self) -> Option<u32>;

    /// Send `signal`. Returns whether the request was accepted.
    fn kill(&self, signal: Signal) -> bool;
}

/// Everything the controller needs from a freshly started process.
pub struct SpawnedProcess {
    pub stdout: Option<ChannelReader>,
    pub stderr: Option<ChannelReader>,
    pub exit: ExitFuture,
    pub killer: Arc<dyn ProcessKiller>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.killer.pid())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Starts external processes.
pub trait ProcessSpawner: Send + Sync {
    /// Start `program` with `args` passed through verbatim.
    ///
    /// Must fail synchronously with [`FfwatchError::Spawn`] when the
    /// executable cannot be started.
    fn spawn(&self, program: &Path, args: &[String]) -> Result<SpawnedProcess>;
}

/// [`ProcessSpawner`] backed by `tokio::process`.
///
/// stdin is nulled, stdout and stderr are piped, and the child is killed if
/// the exit future is dropped before the process has been reaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<SpawnedProcess> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FfwatchError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let pid = child.id();
        debug!("Spawned {} with pid {:?}", program.display(), pid);

        let stdout = child.stdout.take().map(|s| Box::new(s) as ChannelReader);
        let stderr = child.stderr.take().map(|s| Box::new(s) as ChannelReader);

        // The child is only reaped under this lock, and the killer signals
        // under the same lock after checking it is unreaped, so the pid can
        // not have been recycled when the signal goes out.
        #[cfg(unix)]
        let (exit, killer) = {
            use tokio::signal::unix::{signal, SignalKind};

            let mut child_exits = signal(SignalKind::child())
                .map_err(|e| FfwatchError::io("watching for child exit", e))?;
            let child = Arc::new(Mutex::new(child));
            let reaper = child.clone();
            let exit: ExitFuture = async move {
                loop {
                    let status = lock_child(&reaper).try_wait()?;
                    if let Some(status) = status {
                        return Ok(exit_code(status));
                    }
                    if child_exits.recv().await.is_none() {
                        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                    }
                }
            }
            .boxed();
            (exit, TokioKiller { pid, child })
        };

        #[cfg(not(unix))]
        let (exit, killer) = {
            let (kill_tx, mut kill_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
            let exited = Arc::new(AtomicBool::new(false));
            let exited_flag = exited.clone();
            let exit: ExitFuture = async move {
                let mut requests_open = true;
                loop {
                    tokio::select! {
                        status = child.wait() => {
                            exited_flag.store(true, Ordering::SeqCst);
                            return status.map(exit_code);
                        }
                        request = kill_rx.recv(), if requests_open => match request {
                            Some(()) => {
                                if let Err(e) = child.start_kill() {
                                    warn!("Failed to kill child process: {}", e);
                                }
                            }
                            None => requests_open = false,
                        }
                    }
                }
            }
            .boxed();
            (exit, TokioKiller { pid, exited, kill_tx })
        };

        Ok(SpawnedProcess {
            stdout,
            stderr,
            exit,
            killer: Arc::new(killer),
        })
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

/// Fallback poll interval if the SIGCHLD stream closes.
#[cfg(unix)]
const EXIT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

#[cfg(unix)]
fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TokioKiller {
    pid: Option<u32>,
    #[cfg(unix)]
    child: Arc<Mutex<Child>>,
    #[cfg(not(unix))]
    exited: Arc<AtomicBool>,
    #[cfg(not(unix))]
    kill_tx: tokio::sync::mpsc::UnboundedSender<()>,
}

impl ProcessKiller for TokioKiller {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    #[cfg(unix)]
    fn kill(&self, signal: Signal) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let mut child = lock_child(&self.child);
        match child.try_wait() {
            Ok(None) => {}
            // Reaped: the pid may already belong to someone else.
            Ok(Some(_)) => return false,
            Err(e) => {
                warn!("Failed to check process state: {}", e);
                return false;
            }
        }
        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return false;
        };

        match kill(Pid::from_raw(pid), signal.to_nix()) {
            Ok(()) => {
                debug!("Sent {} to process {}", signal, pid);
                true
            }
            Err(e) => {
                warn!("Failed to send {} to process {}: {}", signal, pid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, signal: Signal) -> bool {
        if self.exited.load(Ordering::SeqCst) {
            return false;
        }
        debug!("Requesting forced kill ({} has no native equivalent)", signal);
        self.kill_tx.send(()).is_ok()
    }
}
