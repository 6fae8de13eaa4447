use std::{error::Error as StdError, fmt};

use thiserror::Error;

use super::{job::JobId, state::Lifecycle};

/// Every job must fail with an error type implementing this trait, its `Display` output becomes
/// the job status text after an `"Error: "` prefix.
pub trait RunError: StdError + fmt::Debug + Send + Sync + 'static {}

/// Blanket implementation for all errors that can be sent between threads
impl<T: StdError + fmt::Debug + Send + Sync + 'static> RunError for T {}

#[derive(Debug, Error)]
pub enum Error {
	#[error("job <id='{0}'> is already running")]
	AlreadyRunning(JobId),
	#[error("job <id='{0}'> can't be resumed")]
	NotResumable(JobId),
	#[error("invalid job lifecycle transition: {from:?} -> {to:?}")]
	InvalidTransition { from: Lifecycle, to: Lifecycle },
	#[error("no tokio runtime available to start job <id='{0}'>")]
	NoRuntime(JobId),
	#[error("job not found: {0}")]
	JobNotFound(JobId),
}
