use std::{collections::VecDeque, sync::Arc};

use async_channel as chan;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::{
	config::Config,
	error::Error,
	handle::JobHandle,
	job::{Job, JobId},
	state::JobEvent,
};

/// Keeps the list of jobs shown to the user, most recent first, and funnels the change
/// notifications of all of them into a single channel.
///
/// The events channel is unbounded, whoever owns the tracker is expected to keep draining
/// [`JobTracker::events`].
#[derive(Debug)]
pub struct JobTracker {
	jobs: RwLock<VecDeque<Arc<JobHandle>>>,
	config: Config,
	events_tx: chan::Sender<JobEvent>,
	events_rx: chan::Receiver<JobEvent>,
}

impl Default for JobTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl JobTracker {
	#[must_use]
	pub fn new() -> Self {
		Self::with_config(Config::default())
	}

	#[must_use]
	pub fn with_config(config: Config) -> Self {
		let (events_tx, events_rx) = chan::unbounded();

		Self {
			jobs: RwLock::new(VecDeque::new()),
			config,
			events_tx,
			events_rx,
		}
	}

	#[must_use]
	pub const fn config(&self) -> &Config {
		&self.config
	}

	/// Adds a new job to the top of the list and starts it right away.
	#[instrument(skip_all, err)]
	pub fn add_job(&self, title: impl Into<String>, job: impl Job) -> Result<Arc<JobHandle>, Error> {
		let handle = Arc::new(JobHandle::with_options(
			title,
			job,
			self.config,
			Some(self.events_tx.clone()),
		));

		handle.start()?;

		self.jobs.write().push_front(Arc::clone(&handle));

		debug!(job_id = %handle.id(), "New job added");

		Ok(handle)
	}

	/// The single contextual action clicked on a job: retry it when it's complete and
	/// resumable, cancel it otherwise.
	pub fn on_action(&self, job_id: JobId) -> Result<(), Error> {
		self.get(job_id)
			.ok_or(Error::JobNotFound(job_id))?
			.perform_action()
	}

	/// Removes every complete job from the list, returning them.
	pub fn remove_completed(&self) -> Vec<Arc<JobHandle>> {
		let mut jobs = self.jobs.write();
		let (completed, remaining) = jobs
			.drain(..)
			.partition::<Vec<_>, _>(|job| job.is_complete());

		*jobs = remaining.into();

		debug!(removed = completed.len(), "Removed completed jobs");

		completed
	}

	/// Cancels every job that isn't complete yet.
	pub fn cancel_all(&self) {
		self.jobs
			.read()
			.iter()
			.filter(|job| !job.is_complete())
			.for_each(|job| job.cancel());
	}

	#[must_use]
	pub fn get(&self, job_id: JobId) -> Option<Arc<JobHandle>> {
		self.jobs
			.read()
			.iter()
			.find(|job| job.id() == job_id)
			.cloned()
	}

	/// All jobs, most recent first.
	#[must_use]
	pub fn jobs(&self) -> Vec<Arc<JobHandle>> {
		self.jobs.read().iter().cloned().collect()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.jobs.read().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.jobs.read().is_empty()
	}

	/// A receiver for the change notifications of every job in this tracker.
	#[must_use]
	pub fn events(&self) -> chan::Receiver<JobEvent> {
		self.events_rx.clone()
	}
}
