use std::pin::pin;

use async_channel as chan;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{trace, warn};

use super::{error::Error, job::JobId};

pub const CANCELLED_STATUS: &str = "Cancelled";
pub const ABORTED_STATUS: &str = "Aborted";
pub const ERROR_STATUS_PREFIX: &str = "Error: ";

/// Where a job is on its lifecycle.
///
/// `Cancelled` is sticky, once a job gets there no other transition is accepted and no status
/// text written afterwards is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
	Pending,
	Running,
	Complete,
	/// The run stopped after observing an interruption, instead of finishing its work.
	Aborted,
	Failed,
	Cancelled,
}

impl Lifecycle {
	#[must_use]
	pub const fn can_transition_to(self, next: Self) -> bool {
		match self {
			Self::Pending => matches!(next, Self::Running | Self::Cancelled),
			Self::Running => matches!(
				next,
				Self::Complete | Self::Aborted | Self::Failed | Self::Cancelled
			),
			// Going back to running is only possible through a resume
			Self::Complete | Self::Aborted | Self::Failed => {
				matches!(next, Self::Running | Self::Cancelled)
			}
			Self::Cancelled => false,
		}
	}

	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(
			self,
			Self::Complete | Self::Aborted | Self::Failed | Self::Cancelled
		)
	}
}

/// A bindable numeric range, `[0, 1, 0]` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
	pub min: u64,
	pub max: u64,
	pub value: u64,
	pub tooltip: Option<String>,
}

impl Default for Progress {
	fn default() -> Self {
		Self {
			min: 0,
			max: 1,
			value: 0,
			tooltip: None,
		}
	}
}

/// Icon of the single contextual action a job offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionIcon {
	Cancel,
	Retry,
}

/// A change on any of the observable fields of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobUpdate {
	Title(String),
	Status(String),
	Progress(Progress),
	Completed(bool),
	ActionEnabled(bool),
	ActionIcon(Option<ActionIcon>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
	pub job_id: JobId,
	pub update: JobUpdate,
}

/// How a single run or resume cycle ended, as seen by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
	Done,
	Interrupted,
	Failed(String),
}

#[derive(Debug)]
struct Fields {
	title: String,
	status: String,
	lifecycle: Lifecycle,
	progress: Progress,
	is_complete: bool,
	action_enabled: bool,
	resumable: bool,
}

impl Fields {
	fn transition(&mut self, next: Lifecycle) -> Result<(), Error> {
		if !self.lifecycle.can_transition_to(next) {
			return Err(Error::InvalidTransition {
				from: self.lifecycle,
				to: next,
			});
		}

		trace!(from = ?self.lifecycle, to = ?next, "Job lifecycle transition");
		self.lifecycle = next;

		Ok(())
	}

	fn can_resume(&self) -> bool {
		self.is_complete && self.resumable && self.lifecycle != Lifecycle::Cancelled
	}

	fn is_action_enabled(&self) -> bool {
		self.action_enabled || self.can_resume()
	}

	fn action_icon(&self) -> Option<ActionIcon> {
		if !self.is_action_enabled() {
			None
		} else if self.can_resume() {
			Some(ActionIcon::Retry)
		} else {
			Some(ActionIcon::Cancel)
		}
	}
}

/// Observable state of a job, shared between its handle, its running context and the owner.
///
/// The mutex here plays the role of the completion lock for status and progress, every write
/// happens under it and the matching [`JobEvent`] is sent before releasing it, so events for a
/// single job are received in the same order the writes happened.
#[derive(Debug)]
pub(crate) struct JobState {
	job_id: JobId,
	fields: Mutex<Fields>,
	completion: Notify,
	events_tx: Option<chan::Sender<JobEvent>>,
}

impl JobState {
	pub fn new(
		job_id: JobId,
		title: String,
		events_tx: Option<chan::Sender<JobEvent>>,
	) -> Self {
		Self {
			job_id,
			fields: Mutex::new(Fields {
				title,
				status: String::new(),
				lifecycle: Lifecycle::Pending,
				progress: Progress::default(),
				is_complete: false,
				action_enabled: true,
				resumable: false,
			}),
			completion: Notify::new(),
			events_tx,
		}
	}

	pub const fn job_id(&self) -> JobId {
		self.job_id
	}

	fn emit(&self, update: JobUpdate) {
		if let Some(events_tx) = &self.events_tx {
			if events_tx
				.try_send(JobEvent {
					job_id: self.job_id,
					update,
				})
				.is_err()
			{
				trace!(job_id = %self.job_id, "Job events channel closed, dropping update");
			}
		}
	}

	fn emit_action(&self, fields: &Fields) {
		self.emit(JobUpdate::ActionEnabled(fields.is_action_enabled()));
		self.emit(JobUpdate::ActionIcon(fields.action_icon()));
	}

	pub fn title(&self) -> String {
		self.fields.lock().title.clone()
	}

	pub fn set_title(&self, title: String) {
		let mut fields = self.fields.lock();
		if fields.title != title {
			fields.title.clone_from(&title);
			self.emit(JobUpdate::Title(title));
		}
	}

	pub fn status(&self) -> String {
		self.fields.lock().status.clone()
	}

	/// Returns `false` if the write was ignored because the job was cancelled.
	pub fn set_status(&self, status: String) -> bool {
		let mut fields = self.fields.lock();
		if fields.lifecycle == Lifecycle::Cancelled {
			trace!(job_id = %self.job_id, %status, "Ignoring status update on cancelled job");
			return false;
		}

		if fields.status != status {
			fields.status.clone_from(&status);
			self.emit(JobUpdate::Status(status));
		}

		true
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.fields.lock().lifecycle
	}

	pub fn progress(&self) -> Progress {
		self.fields.lock().progress.clone()
	}

	pub fn update_progress(&self, update: impl FnOnce(&mut Progress)) {
		let mut fields = self.fields.lock();
		let before = fields.progress.clone();
		update(&mut fields.progress);
		if fields.progress != before {
			self.emit(JobUpdate::Progress(fields.progress.clone()));
		}
	}

	pub fn is_complete(&self) -> bool {
		self.fields.lock().is_complete
	}

	pub fn is_action_enabled(&self) -> bool {
		self.fields.lock().is_action_enabled()
	}

	pub fn action_icon(&self) -> Option<ActionIcon> {
		self.fields.lock().action_icon()
	}

	pub fn can_resume(&self) -> bool {
		self.fields.lock().can_resume()
	}

	/// Enters the running state for a new run (from `Pending`) or resume cycle (from a terminal
	/// state other than `Cancelled`).
	pub fn begin_run(&self, resuming: bool) -> Result<(), Error> {
		let mut fields = self.fields.lock();

		if !resuming && fields.lifecycle != Lifecycle::Pending {
			return Err(Error::InvalidTransition {
				from: fields.lifecycle,
				to: Lifecycle::Running,
			});
		}

		fields.transition(Lifecycle::Running)?;

		if resuming && !fields.status.is_empty() {
			fields.status.clear();
			self.emit(JobUpdate::Status(String::new()));
		}

		if fields.is_complete {
			fields.is_complete = false;
			self.emit(JobUpdate::Completed(false));
		}

		fields.action_enabled = true;
		fields.resumable = false;
		self.emit_action(&fields);

		Ok(())
	}

	/// Common completion handling of every cycle, runs no matter how the cycle ended.
	pub fn finish(&self, outcome: Outcome, resumable: bool) {
		{
			let mut fields = self.fields.lock();

			if fields.lifecycle == Lifecycle::Cancelled {
				trace!(job_id = %self.job_id, ?outcome, "Job finished after being cancelled");
			} else {
				let (next, status) = match outcome {
					Outcome::Done => (Lifecycle::Complete, None),
					Outcome::Interrupted => (Lifecycle::Aborted, Some(ABORTED_STATUS.to_string())),
					Outcome::Failed(message) => (
						Lifecycle::Failed,
						Some(format!("{ERROR_STATUS_PREFIX}{message}")),
					),
				};

				if let Err(e) = fields.transition(next) {
					warn!(job_id = %self.job_id, ?e, "Unexpected transition when finishing job");
				}

				if let Some(status) = status {
					if fields.status != status {
						fields.status.clone_from(&status);
						self.emit(JobUpdate::Status(status));
					}
				}
			}

			fields.resumable = resumable;
			fields.action_enabled = false;
			if !fields.is_complete {
				fields.is_complete = true;
				self.emit(JobUpdate::Completed(true));
			}
			self.emit_action(&fields);
		}

		self.completion.notify_waiters();
	}

	/// Moves the job to the sticky `Cancelled` state, returns `false` if it was already there.
	///
	/// When nothing is running the job is also marked as complete right away, as no supervisor
	/// will be around to do it.
	pub fn cancel(&self, mark_complete: bool) -> bool {
		{
			let mut fields = self.fields.lock();

			if fields.lifecycle == Lifecycle::Cancelled {
				trace!(job_id = %self.job_id, "Job already cancelled");
				return false;
			}

			if let Err(e) = fields.transition(Lifecycle::Cancelled) {
				warn!(job_id = %self.job_id, ?e, "Failed to cancel job");
				return false;
			}

			if fields.status != CANCELLED_STATUS {
				fields.status = CANCELLED_STATUS.to_string();
				self.emit(JobUpdate::Status(CANCELLED_STATUS.to_string()));
			}

			fields.action_enabled = false;
			if mark_complete && !fields.is_complete {
				fields.is_complete = true;
				self.emit(JobUpdate::Completed(true));
			}
			self.emit_action(&fields);

			if !mark_complete {
				return true;
			}
		}

		self.completion.notify_waiters();

		true
	}

	/// Waits until the current cycle is complete.
	pub async fn wait_complete(&self) {
		loop {
			let mut notified = pin!(self.completion.notified());
			notified.as_mut().enable();

			if self.is_complete() {
				return;
			}

			notified.await;
		}
	}
}
