use std::{marker::PhantomData, mem, sync::Arc};

use async_channel as chan;
use parking_lot::Mutex;
use tokio::sync::{futures::Notified, Notify};
use tracing::{debug, instrument, trace};

use crate::{error::RunError, interrupter::Interrupter, job::ExecStatus};

use super::JobUnit;

pub(super) type WorkerId = usize;

/// Units already executed, and the condition used to wake the coordinator up when this list
/// grows or when a worker fails.
pub(super) struct Completion<U> {
	units: Mutex<Vec<U>>,
	notify: Notify,
}

impl<U> Completion<U> {
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			units: Mutex::new(Vec::with_capacity(capacity)),
			notify: Notify::new(),
		}
	}

	pub fn count(&self) -> usize {
		self.units.lock().len()
	}

	pub fn notified(&self) -> Notified<'_> {
		self.notify.notified()
	}

	pub fn take_units(&self) -> Vec<U> {
		mem::take(&mut *self.units.lock())
	}

	fn push(&self, unit: U) {
		self.units.lock().push(unit);
		self.signal();
	}

	fn signal(&self) {
		// `notify_one` stores a permit when the coordinator isn't waiting yet
		self.notify.notify_one();
	}
}

/// Failure captured by a worker, written only by its invoker and read by the coordinator after
/// being signaled.
pub(super) type FailureSlot<E> = Arc<Mutex<Option<E>>>;

/// Per worker execution context, drains the pending units until there are none left, until it
/// gets interrupted or until one of its units fails.
pub(super) struct Invoker<U, E> {
	worker_id: WorkerId,
	pending_rx: chan::Receiver<U>,
	completion: Arc<Completion<U>>,
	failure: FailureSlot<E>,
	interrupter: Interrupter,
	_error: PhantomData<fn() -> E>,
}

impl<E: RunError, U: JobUnit<E>> Invoker<U, E> {
	pub fn new(
		worker_id: WorkerId,
		pending_rx: chan::Receiver<U>,
		completion: Arc<Completion<U>>,
		interrupter: Interrupter,
	) -> Self {
		Self {
			worker_id,
			pending_rx,
			completion,
			failure: Arc::new(Mutex::new(None)),
			interrupter,
			_error: PhantomData,
		}
	}

	pub fn failure_slot(&self) -> FailureSlot<E> {
		Arc::clone(&self.failure)
	}

	/// Pops the next pending unit, `None` when the queue is empty.
	fn next_unit(&self) -> Option<U> {
		self.pending_rx.try_recv().ok()
	}

	#[instrument(name = "job_unit_invoker", skip(self), fields(worker_id = self.worker_id))]
	pub async fn run(self) {
		debug!("Invoker starting");

		loop {
			if self.interrupter.is_interrupted() {
				trace!("Invoker interrupted between units");
				break;
			}

			let Some(mut unit) = self.next_unit() else {
				trace!("No more pending units");
				break;
			};

			self.failure.lock().take();

			match unit.execute(&self.interrupter).await {
				Ok(ExecStatus::Done) => self.completion.push(unit),

				Ok(ExecStatus::Canceled) => {
					trace!("Job unit stopped after interruption");
					self.completion.signal();
					break;
				}

				Err(e) => {
					debug!(?e, "Job unit failed, invoker will stop");
					*self.failure.lock() = Some(e);
					self.completion.signal();
					break;
				}
			}
		}

		debug!("Invoker finished");
	}
}
