use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{
	config::Config,
	error::RunError,
	interrupter::Interrupter,
	state::{JobState, Outcome, Progress},
};

/// A unique identifier for a job using the [`uuid`](https://docs.rs/uuid) crate.
pub type JobId = Uuid;

/// Represents whether the current [`Job::run`] (or [`Job::resume`]) finished its work or stopped
/// early after observing an interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
	Done,
	Canceled,
}

/// The main trait that represents a long running, user visible operation.
///
/// Implementors only bring the actual work, the [`JobHandle`](crate::JobHandle) takes care of
/// running it in the background, tracking its lifecycle and turning its outcome into the status
/// text shown to the user.
///
/// We're currently using the [`async_trait`](https://docs.rs/async-trait) crate to allow dyn async traits,
/// due to a limitation in the Rust language.
#[async_trait]
pub trait Job: Send + 'static {
	type Error: RunError;

	/// The work to be done, it will be called once when the job is started.
	///
	/// The [`JobContext`] gives access to the observable fields of the job, so the implementation
	/// can report its progress, and to an [`Interrupter`] to check if the user requested a cancel.
	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, Self::Error>;

	/// Called instead of [`Job::run`] when a completed job is resumed, does nothing by default.
	async fn resume(&mut self, ctx: &JobContext) -> Result<ExecStatus, Self::Error> {
		let _ = ctx;
		Ok(ExecStatus::Done)
	}

	/// Whether a completed job can be restarted through [`Job::resume`].
	fn can_resume(&self) -> bool {
		false
	}
}

/// Everything a running job can touch: its observable fields, its interrupter and the
/// configuration it was started with.
#[derive(Debug, Clone)]
pub struct JobContext {
	state: Arc<JobState>,
	interrupter: Interrupter,
	config: Config,
}

impl JobContext {
	pub(crate) fn new(state: Arc<JobState>, interrupter: Interrupter, config: Config) -> Self {
		Self {
			state,
			interrupter,
			config,
		}
	}

	#[must_use]
	pub fn id(&self) -> JobId {
		self.state.job_id()
	}

	#[must_use]
	pub const fn interrupter(&self) -> &Interrupter {
		&self.interrupter
	}

	#[must_use]
	pub const fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn title(&self) -> String {
		self.state.title()
	}

	pub fn set_title(&self, title: impl Into<String>) {
		self.state.set_title(title.into());
	}

	/// Updates the status text, ignored if the job was already cancelled.
	pub fn set_status(&self, status: impl Into<String>) {
		self.state.set_status(status.into());
	}

	#[must_use]
	pub fn progress(&self) -> Progress {
		self.state.progress()
	}

	pub fn set_progress_range(&self, min: u64, max: u64) {
		self.state.update_progress(|progress| {
			progress.min = min;
			progress.max = max;
		});
	}

	pub fn set_progress_value(&self, value: u64) {
		self.state.update_progress(|progress| progress.value = value);
	}

	pub fn set_progress_tooltip(&self, tooltip: Option<String>) {
		self.state.update_progress(|progress| progress.tooltip = tooltip);
	}

	pub(crate) fn state(&self) -> &JobState {
		&self.state
	}
}

/// Erases the error type of a [`Job`] so jobs of different kinds can live side by side.
#[async_trait]
pub(crate) trait DynJob: Send + 'static {
	async fn run_cycle(&mut self, ctx: &JobContext, resuming: bool) -> Outcome;

	fn is_resumable(&self) -> bool;
}

#[async_trait]
impl<J: Job> DynJob for J {
	async fn run_cycle(&mut self, ctx: &JobContext, resuming: bool) -> Outcome {
		let res = if resuming {
			self.resume(ctx).await
		} else {
			self.run(ctx).await
		};

		match res {
			Ok(ExecStatus::Done) => Outcome::Done,
			Ok(ExecStatus::Canceled) => Outcome::Interrupted,
			Err(e) => {
				debug!(job_id = %ctx.id(), ?e, "Job failed");
				Outcome::Failed(e.to_string())
			}
		}
	}

	fn is_resumable(&self) -> bool {
		self.can_resume()
	}
}
