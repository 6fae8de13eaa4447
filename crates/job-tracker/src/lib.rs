//!
//! # Job Tracker
//!
//! Runs long user visible operations (uploads, downloads, batch calls to remote services) in the
//! background, keeping for each of them a status line, a progress bar and a single contextual
//! action, which cancels a running job or retries a resumable one.
//!
//! Just implement [`Job`] for your operation, or [`QueueJob`] when it can be split in many
//! independent units, and hand it to a [`JobTracker`]. The tracker will handle:
//! - Running each job on its own background task, converting any failure or panic into the
//!   job's status;
//! - Fanning the units of queue jobs out to a bounded pool of workers, aggregating their progress
//!   and reporting only the first failure;
//! - Gracefully cancelling jobs, with forced abortion for the ones that don't cooperate;
//! - Resuming jobs that support it;
//! - Notifying every change on the observable fields of every job through a single channel.
//!
//! ## Basic example
//!
//! ```
//! use sd_job_tracker::{ExecStatus, Job, JobContext, JobTracker};
//! use async_trait::async_trait;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SampleError {
//!     #[error("Sample error")]
//!     SampleError,
//! }
//!
//! #[derive(Debug)]
//! pub struct ReadyJob;
//!
//! #[async_trait]
//! impl Job for ReadyJob {
//!     type Error = SampleError;
//!
//!     async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
//!         ctx.set_status("All done");
//!         Ok(ExecStatus::Done)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = JobTracker::new();
//!
//!     let job = tracker.add_job("Ready", ReadyJob).unwrap();
//!
//!     job.wait().await;
//!
//!     assert!(job.is_complete());
//!     assert_eq!(job.current_status(), "All done");
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
mod handle;
mod interrupter;
mod job;
mod queue;
mod state;
mod tracker;

pub use config::{
	Config as JobTrackerConfig, DEFAULT_CANCEL_GRACE_PERIOD_MS, DEFAULT_POLL_INTERVAL_MS,
	DEFAULT_SHUTDOWN_JOIN_TIMEOUT_MS, DEFAULT_SHUTDOWN_PASSES, DEFAULT_WORKER_COUNT,
};
pub use error::{Error as JobTrackerError, RunError};
pub use handle::JobHandle;
pub use interrupter::{Interrupter, InterrupterFuture};
pub use job::{ExecStatus, Job, JobContext, JobId};
pub use queue::{JobUnit, QueueJob, QueueJobError, QueueProcessingJob};
pub use state::{
	ActionIcon, JobEvent, JobUpdate, Lifecycle, Progress, ABORTED_STATUS, CANCELLED_STATUS,
};
pub use tracker::JobTracker;
