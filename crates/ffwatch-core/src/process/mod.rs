//! External process control.
//!
//! [`Transcoder`] owns the lifecycle of one external ffmpeg process at a
//! time: it spawns through a [`ProcessSpawner`], streams both output channels,
//! feeds diagnostics to the progress extractor and resolves a
//! [`RunOutcome`](crate::RunOutcome) when the process is gone.
//!
//! # Example
//!
//! ```rust,no_run
//! use ffwatch_core::Transcoder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transcoder = Transcoder::new(["-i", "in.mp4", "-c:v", "libx264", "out.mp4"]);
//!     transcoder.on_progress(|snap| {
//!         if let Some(percent) = snap.percent {
//!             eprintln!("{percent:.1}%");
//!         }
//!     });
//!
//!     match transcoder.start().await {
//!         ffwatch_core::RunOutcome::Success => println!("done"),
//!         ffwatch_core::RunOutcome::Failure(f) => eprintln!("failed ({}): {}", f.code, f.message),
//!     }
//! }
//! ```

mod controller;
mod decoder;
mod signal;
mod spawner;

pub use controller::{Transcoder, TranscoderState};
pub use signal::Signal;
pub use spawner::{
    ChannelReader, ExitFuture, ProcessKiller, ProcessSpawner, SpawnedProcess, TokioSpawner,
};
