//! FFmpeg/FFprobe integration.
//!
//! This crate provides:
//! - A probe wrapper producing `MediaInfo` from a local file
//! - The command builder turning a compiled graph into an argv
//! - The subprocess runner with progress parsing and cancellation

pub mod command;
pub mod error;
pub mod probe;
pub mod progress;
pub mod runner;

pub use command::CommandBuilder;
pub use error::{MediaError, MediaResult};
pub use probe::probe;
pub use progress::{Progress, ProgressParser};
pub use runner::{FfmpegRunner, LogCallback, ProgressCallback};
