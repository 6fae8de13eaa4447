//! Jobs made of many independent units of work, processed by a bounded pool of workers.
//!
//! A [`QueueJob`] builds its units, then [`QueueProcessingJob`] spins up to
//! `min(worker_count, units)` workers that drain the queue concurrently while the coordinator
//! keeps the job's progress and status up to date. The first failure observed by the coordinator
//! becomes the job's failure, and the remaining workers are shutdown. Note that sibling workers
//! are not stopped right away when a unit fails, they keep going until the coordinator notices
//! it, so a few extra units may complete on a job that is already doomed to fail.

use std::sync::Arc;

use async_channel as chan;
use async_trait::async_trait;
use thiserror::Error;
use tokio::{spawn, task::JoinHandle, time::timeout};
use tracing::{debug, error, instrument, trace, warn, Instrument};

use super::{
	config::Config,
	error::RunError,
	interrupter::Interrupter,
	job::{ExecStatus, Job, JobContext},
};

mod invoker;

use invoker::{Completion, FailureSlot, Invoker, WorkerId};

/// An independent and order insensitive piece of work belonging to a [`QueueJob`].
#[async_trait]
pub trait JobUnit<E: RunError>: Send + 'static {
	/// Runs this unit, long units should watch the `interrupter` and return
	/// `Ok(ExecStatus::Canceled)` when it fires.
	async fn execute(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, E>;
}

/// A job that can be decomposed in many [`JobUnit`]s, to be wrapped in a [`QueueProcessingJob`].
#[async_trait]
pub trait QueueJob: Send + 'static {
	type Error: RunError;
	type Unit: JobUnit<Self::Error>;

	/// Builds the queue of units for a run (or resume) cycle, they'll be dequeued in this order.
	async fn build_units(&mut self, ctx: &JobContext) -> Result<Vec<Self::Unit>, Self::Error>;

	/// Suffix of the `"{completed} / {total} {suffix}"` status text.
	fn status_suffix(&self) -> String;

	/// Amount of workers for this job, the configured default when `None`.
	fn worker_count(&self) -> Option<usize> {
		None
	}

	/// Called at the end of every cycle with the units that completed and the failure, if any,
	/// before the job's outcome is reported.
	async fn on_finished(
		&mut self,
		ctx: &JobContext,
		completed: Vec<Self::Unit>,
		error: Option<&QueueJobError<Self::Error>>,
	) {
		let _ = (ctx, completed, error);
	}

	/// Whether a completed job can be resumed, resuming runs the whole pipeline again with a
	/// freshly built queue.
	fn can_resume(&self) -> bool {
		false
	}
}

#[derive(Debug, Error)]
pub enum QueueJobError<E: RunError> {
	#[error(transparent)]
	Job(E),
	#[error("a job unit panicked")]
	UnitPanicked,
}

/// Adapts a [`QueueJob`] into a [`Job`].
#[derive(Debug)]
pub struct QueueProcessingJob<J> {
	inner: J,
}

impl<J: QueueJob> QueueProcessingJob<J> {
	pub const fn new(inner: J) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl<J: QueueJob> Job for QueueProcessingJob<J> {
	type Error = QueueJobError<J::Error>;

	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, Self::Error> {
		self.process(ctx).await
	}

	async fn resume(&mut self, ctx: &JobContext) -> Result<ExecStatus, Self::Error> {
		self.process(ctx).await
	}

	fn can_resume(&self) -> bool {
		self.inner.can_resume()
	}
}

struct WorkerSlot<E> {
	id: WorkerId,
	failure: FailureSlot<E>,
	handle: Option<JoinHandle<()>>,
}

impl<E> Drop for WorkerSlot<E> {
	fn drop(&mut self) {
		// Only reached with a live handle when the coordinator itself got aborted
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}

impl<J: QueueJob> QueueProcessingJob<J> {
	#[instrument(skip_all, fields(job_id = %ctx.id()))]
	async fn process(&mut self, ctx: &JobContext) -> Result<ExecStatus, QueueJobError<J::Error>> {
		let units = match self.inner.build_units(ctx).await {
			Ok(units) => units,
			Err(e) => {
				let e = QueueJobError::Job(e);
				self.inner.on_finished(ctx, vec![], Some(&e)).await;
				return Err(e);
			}
		};

		let total = units.len();
		let suffix = self.inner.status_suffix();
		let completion = Arc::new(Completion::with_capacity(total));

		ctx.set_progress_range(0, total as u64);
		ctx.set_progress_value(0);

		let workers_count = self
			.inner
			.worker_count()
			.unwrap_or(ctx.config().default_worker_count)
			.max(1)
			.min(total);

		debug!(%total, %workers_count, "Processing job units");

		let (pending_tx, pending_rx) = chan::bounded(total.max(1));
		for unit in units {
			// Room for every unit and we hold the receiver, so it only fails on a broken channel
			if pending_tx.try_send(unit).is_err() {
				error!("Failed to enqueue job unit, it will never run");
			}
		}
		pending_tx.close();

		let workers_interrupter = ctx.interrupter().child();

		let mut workers = (0..workers_count)
			.map(|id| {
				let invoker = Invoker::new(
					id,
					pending_rx.clone(),
					Arc::clone(&completion),
					workers_interrupter.clone(),
				);

				WorkerSlot {
					id,
					failure: invoker.failure_slot(),
					handle: Some(spawn(invoker.run().in_current_span())),
				}
			})
			.collect::<Vec<_>>();

		drop(pending_rx);

		let res = loop {
			if completion.count() == total {
				break Ok(ExecStatus::Done);
			}

			if timeout(ctx.config().poll_interval(), completion.notified())
				.await
				.is_err()
			{
				trace!("Queue coordinator poll tick");
			}

			if let Some(e) = first_failure(&mut workers).await {
				break Err(e);
			}

			if ctx.interrupter().is_interrupted() {
				trace!("Queue processing interrupted");
				break Ok(ExecStatus::Canceled);
			}

			let completed = completion.count();
			if completed != total && workers.iter().all(|worker| worker.handle.is_none()) {
				warn!(%completed, %total, "All workers stopped before draining the queue");
				break Ok(ExecStatus::Canceled);
			}

			report_progress(ctx, completed, total, &suffix);
		};

		match &res {
			Ok(ExecStatus::Done) => {
				report_progress(ctx, completion.count(), total, &suffix);
				join_workers(&mut workers).await;
			}
			Ok(ExecStatus::Canceled) | Err(_) => {
				shutdown_workers(&workers_interrupter, &mut workers, ctx.config()).await;
			}
		}

		self.inner
			.on_finished(ctx, completion.take_units(), res.as_ref().err())
			.await;

		res
	}
}

fn report_progress(ctx: &JobContext, completed: usize, total: usize, suffix: &str) {
	ctx.set_progress_value(completed as u64);
	ctx.set_status(format!("{completed} / {total} {suffix}"));
}

/// Looks for a failure captured by any worker, or a worker that panicked. Only the first one
/// found is reported.
///
/// Finished workers are reaped before reading the failure slots, so a worker seen as finished
/// here always had its failure read too.
async fn first_failure<E: RunError>(workers: &mut [WorkerSlot<E>]) -> Option<QueueJobError<E>> {
	let mut panicked = false;

	for worker in workers.iter_mut() {
		if let Some(handle) = worker.handle.take_if(|handle| handle.is_finished()) {
			if let Err(e) = handle.await {
				if e.is_panic() {
					error!(worker_id = worker.id, ?e, "Worker panicked");
					panicked = true;
				}
			}
		}
	}

	workers
		.iter()
		.find_map(|worker| worker.failure.lock().take())
		.map(QueueJobError::Job)
		.or_else(|| panicked.then_some(QueueJobError::UnitPanicked))
}

async fn join_workers<E>(workers: &mut [WorkerSlot<E>]) {
	for worker in workers.iter_mut() {
		if let Some(handle) = worker.handle.take() {
			if let Err(e) = handle.await {
				warn!(worker_id = worker.id, ?e, "Worker failed to join");
			}
		}
	}
}

/// Asks every worker to stop, then tries to join them in a few passes, aborting the ones that
/// don't stop in time. Nothing here can fail the job.
async fn shutdown_workers<E>(
	interrupter: &Interrupter,
	workers: &mut [WorkerSlot<E>],
	config: &Config,
) {
	interrupter.interrupt();

	for pass in 1..=config.shutdown_passes {
		let mut still_running = 0;

		for worker in workers.iter_mut() {
			let Some(handle) = worker.handle.as_mut() else {
				continue;
			};

			match timeout(config.shutdown_join_timeout(), &mut *handle).await {
				Ok(res) => {
					if let Err(e) = res {
						if !e.is_cancelled() {
							warn!(worker_id = worker.id, ?e, "Worker failed while shutting down");
						}
					}
					worker.handle = None;
				}
				Err(_) => {
					trace!(worker_id = worker.id, %pass, "Worker still running, aborting it");
					handle.abort();
					still_running += 1;
				}
			}
		}

		if still_running == 0 {
			return;
		}
	}

	warn!("Some workers didn't shutdown after all passes");
}
