use std::{sync::Arc, time::Duration};

use async_channel as chan;
use futures_concurrency::future::Race;
use parking_lot::Mutex;
use tokio::{
	runtime::Handle,
	spawn,
	sync::Mutex as AsyncMutex,
	task::{JoinError, JoinHandle},
	time::sleep,
};
use tracing::{error, instrument, trace, warn, Instrument};

use super::{
	config::Config,
	error::Error,
	interrupter::Interrupter,
	job::{DynJob, Job, JobContext, JobId},
	state::{ActionIcon, JobEvent, JobState, Lifecycle, Outcome, Progress},
};

type SharedJob = Arc<AsyncMutex<Box<dyn DynJob>>>;

#[derive(Debug)]
struct Runner {
	handle: JoinHandle<()>,
	interrupter: Interrupter,
}

impl Runner {
	/// The supervisor lingers a little after completing the job, so completion is what counts.
	fn is_running(&self, state: &JobState) -> bool {
		!self.handle.is_finished() && !state.is_complete()
	}
}

/// The user facing side of a job: its observable fields and its single contextual action.
///
/// Each run or resume cycle happens on a background supervisor task, which owns the job for the
/// duration of the cycle and always performs the completion handling, no matter if the job
/// finished, failed, panicked or was aborted.
pub struct JobHandle {
	id: JobId,
	state: Arc<JobState>,
	job: SharedJob,
	config: Config,
	runner: Mutex<Option<Runner>>,
}

impl std::fmt::Debug for JobHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JobHandle")
			.field("id", &self.id)
			.field("state", &self.state)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl JobHandle {
	pub fn new(title: impl Into<String>, job: impl Job) -> Self {
		Self::with_options(title, job, Config::default(), None)
	}

	/// Creates a handle that runs with the given `config` and reports every change on its
	/// observable fields through `events_tx`.
	pub fn with_options(
		title: impl Into<String>,
		job: impl Job,
		config: Config,
		events_tx: Option<chan::Sender<JobEvent>>,
	) -> Self {
		let id = JobId::new_v4();
		let job: Box<dyn DynJob> = Box::new(job);

		Self {
			id,
			state: Arc::new(JobState::new(id, title.into(), events_tx)),
			job: Arc::new(AsyncMutex::new(job)),
			config,
			runner: Mutex::new(None),
		}
	}

	#[must_use]
	pub const fn id(&self) -> JobId {
		self.id
	}

	#[must_use]
	pub fn title(&self) -> String {
		self.state.title()
	}

	#[must_use]
	pub fn current_status(&self) -> String {
		self.state.status()
	}

	#[must_use]
	pub fn lifecycle(&self) -> Lifecycle {
		self.state.lifecycle()
	}

	#[must_use]
	pub fn progress(&self) -> Progress {
		self.state.progress()
	}

	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.state.is_complete()
	}

	/// Whether the contextual action can be clicked, either to cancel a running job or to retry a
	/// resumable one.
	#[must_use]
	pub fn is_action_enabled(&self) -> bool {
		self.state.is_action_enabled()
	}

	#[must_use]
	pub fn action_icon(&self) -> Option<ActionIcon> {
		self.state.action_icon()
	}

	/// Whether the job is complete and can be restarted with [`JobHandle::start_resume`].
	#[must_use]
	pub fn can_resume(&self) -> bool {
		self.state.can_resume()
	}

	/// Starts the job on a background task, must be called from within a tokio runtime.
	#[instrument(skip(self), fields(job_id = %self.id), err)]
	pub fn start(&self) -> Result<(), Error> {
		self.spawn_cycle(false)
	}

	/// Starts a new cycle of a complete and resumable job, through [`Job::resume`].
	#[instrument(skip(self), fields(job_id = %self.id), err)]
	pub fn start_resume(&self) -> Result<(), Error> {
		if !self.can_resume() {
			return Err(Error::NotResumable(self.id));
		}

		self.spawn_cycle(true)
	}

	/// Best effort cancellation, it never fails and calling it again is a no-op.
	///
	/// The running job is asked to stop through its [`Interrupter`] and, if it doesn't stop by
	/// itself within the configured grace period, it gets forcefully aborted. The status becomes
	/// `"Cancelled"` right away and stays like that.
	#[instrument(skip(self), fields(job_id = %self.id))]
	pub fn cancel(&self) {
		let is_running = self.runner.lock().as_ref().map_or(false, |runner| {
			if runner.is_running(&self.state) {
				trace!("Job is running, sending interruption request");
				runner.interrupter.interrupt();
				true
			} else {
				false
			}
		});

		if self.state.cancel(!is_running) {
			trace!("Job cancelled");
		}
	}

	/// The single contextual action: retry a complete and resumable job, cancel otherwise.
	pub fn perform_action(&self) -> Result<(), Error> {
		if self.can_resume() {
			self.start_resume()
		} else {
			self.cancel();
			Ok(())
		}
	}

	/// Waits until the current cycle is complete, never returns for a job that was never started
	/// nor cancelled.
	pub async fn wait(&self) {
		self.state.wait_complete().await;
	}

	fn spawn_cycle(&self, resuming: bool) -> Result<(), Error> {
		let mut runner = self.runner.lock();

		if runner
			.as_ref()
			.is_some_and(|runner| runner.is_running(&self.state))
		{
			return Err(Error::AlreadyRunning(self.id));
		}

		let runtime = Handle::try_current().map_err(|_| Error::NoRuntime(self.id))?;

		self.state.begin_run(resuming)?;

		let interrupter = Interrupter::new();
		let ctx = JobContext::new(Arc::clone(&self.state), interrupter.clone(), self.config);

		let handle = runtime.spawn(
			supervise(
				Arc::clone(&self.job),
				ctx,
				resuming,
				self.config.cancel_grace_period(),
			)
			.in_current_span(),
		);

		*runner = Some(Runner {
			handle,
			interrupter,
		});

		Ok(())
	}
}

enum SupervisorEvent {
	Finished(Result<Outcome, JoinError>),
	GracePeriodExpired,
}

async fn supervise(job: SharedJob, ctx: JobContext, resuming: bool, grace_period: Duration) {
	trace!(%resuming, "Job cycle starting");

	let mut inner = spawn({
		let job = Arc::clone(&job);
		let ctx = ctx.clone();

		async move {
			let mut job = job.lock_owned().await;
			job.run_cycle(&ctx, resuming).await
		}
		.in_current_span()
	});

	let event = (
		async { SupervisorEvent::Finished((&mut inner).await) },
		async {
			ctx.interrupter().await;
			sleep(grace_period).await;
			SupervisorEvent::GracePeriodExpired
		},
	)
		.race()
		.await;

	let res = match event {
		SupervisorEvent::Finished(res) => res,
		SupervisorEvent::GracePeriodExpired => {
			warn!(
				?grace_period,
				"Job didn't stop after being canceled, forcing abortion"
			);
			inner.abort();
			inner.await
		}
	};

	let outcome = res.unwrap_or_else(|e| {
		if e.is_panic() {
			error!(?e, "Job panicked");
			Outcome::Failed("job panicked".to_string())
		} else {
			trace!("Job was aborted");
			Outcome::Interrupted
		}
	});

	// The inner task is gone by now, so the lock is free unless someone else holds it
	let resumable = job.try_lock().map_or(false, |job| job.is_resumable());

	trace!(?outcome, %resumable, "Job cycle finished");

	ctx.state().finish(outcome, resumable);
}
