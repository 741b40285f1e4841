//! Job lifecycle driving for Mediaflow.
//!
//! One driver instance serves the whole process; each submitted job runs
//! in its own task with a cancellation signal wired through to the
//! subprocess runner.

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;

pub use config::WorkerConfig;
pub use driver::JobDriver;
pub use error::DriveError;
pub use logging::JobLogger;
