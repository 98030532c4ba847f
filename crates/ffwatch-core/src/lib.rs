//! ffwatch Core - drive an external ffmpeg process and watch its progress.
//!
//! This crate wraps one ffmpeg invocation per [`Transcoder`] instance: it
//! starts the process with a caller-supplied argument list, streams stdout
//! and stderr to subscribers, parses the diagnostic stream into a
//! [`ProgressSnapshot`] and reports the result as a [`RunOutcome`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ffwatch_core::{RunOutcome, Transcoder, TranscoderOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transcoder = Transcoder::with_options(
//!         ["-y", "-i", "input.mkv", "output.mp4"],
//!         TranscoderOptions::from_env(),
//!     );
//!
//!     let watcher = transcoder.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(std::time::Duration::from_secs(600)).await;
//!         watcher.stop();
//!     });
//!
//!     transcoder.on_progress(|snap| println!("{:?}", snap.percent));
//!
//!     if let RunOutcome::Failure(failure) = transcoder.start().await {
//!         eprintln!("{failure}");
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod outcome;
pub mod process;
pub mod progress;
pub mod trailing;

pub use config::{TranscodeConfig, TranscoderOptions};
pub use error::{FfwatchError, Result};
pub use events::{EventBus, EventKind, Listener, SubscriptionId, TranscodeEvent};
pub use outcome::{FailureKind, RunFailure, RunOutcome};
pub use process::{
    ChannelReader, ExitFuture, ProcessKiller, ProcessSpawner, Signal, SpawnedProcess,
    TokioSpawner, Transcoder, TranscoderState,
};
pub use progress::{parse_timestamp, ProgressExtractor, ProgressSnapshot};
pub use trailing::TrailingBuffer;
