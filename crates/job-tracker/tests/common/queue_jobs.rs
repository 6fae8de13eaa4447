use sd_job_tracker::{
	ExecStatus, Interrupter, JobContext, JobUnit, QueueJob, QueueJobError,
};

use std::{
	collections::HashSet,
	future::pending,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Barrier, time::sleep};

use super::jobs::SampleError;

#[derive(Debug, Default)]
pub struct UnitStats {
	pub running: AtomicUsize,
	pub max_running: AtomicUsize,
	pub executed: AtomicUsize,
}

impl UnitStats {
	pub fn running(&self) -> usize {
		self.running.load(Ordering::SeqCst)
	}

	pub fn max_running(&self) -> usize {
		self.max_running.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Clone)]
pub enum Behavior {
	Succeed,
	Fail(&'static str),
	Panic,
	/// Stops only when interrupted
	WaitInterruption,
	/// Never stops by itself
	IgnoreInterruption,
	/// Stops right away without being asked to
	GiveUp,
}

#[derive(Debug)]
pub struct SampleUnit {
	pub id: usize,
	behavior: Behavior,
	delay: Duration,
	gate: Option<Arc<Barrier>>,
	stats: Arc<UnitStats>,
}

impl SampleUnit {
	pub fn new(id: usize, behavior: Behavior, delay: Duration, stats: &Arc<UnitStats>) -> Self {
		Self {
			id,
			behavior,
			delay,
			gate: None,
			stats: Arc::clone(stats),
		}
	}

	/// The unit only starts its work after all units sharing this gate are executing
	pub fn with_gate(mut self, gate: &Arc<Barrier>) -> Self {
		self.gate = Some(Arc::clone(gate));
		self
	}

	async fn behave(&self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		if let Some(gate) = &self.gate {
			gate.wait().await;
		}

		match self.behavior {
			Behavior::Succeed => {
				sleep(self.delay).await;
				Ok(ExecStatus::Done)
			}
			Behavior::Fail(message) => {
				sleep(self.delay).await;
				Err(SampleError::new(message))
			}
			Behavior::Panic => panic!("SampleUnit <id='{}'> panicked", self.id),
			Behavior::WaitInterruption => {
				interrupter.await;
				Ok(ExecStatus::Canceled)
			}
			Behavior::IgnoreInterruption => pending().await,
			Behavior::GiveUp => Ok(ExecStatus::Canceled),
		}
	}
}

#[async_trait]
impl JobUnit<SampleError> for SampleUnit {
	async fn execute(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		let running = self.stats.running.fetch_add(1, Ordering::SeqCst) + 1;
		self.stats.max_running.fetch_max(running, Ordering::SeqCst);

		let res = self.behave(interrupter).await;

		self.stats.running.fetch_sub(1, Ordering::SeqCst);
		self.stats.executed.fetch_add(1, Ordering::SeqCst);

		res
	}
}

pub fn units(
	count: usize,
	behavior: Behavior,
	delay: Duration,
	stats: &Arc<UnitStats>,
) -> Vec<SampleUnit> {
	(0..count)
		.map(|id| SampleUnit::new(id, behavior.clone(), delay, stats))
		.collect()
}

#[derive(Debug, Default)]
pub struct FinishedReport {
	pub calls: usize,
	pub completed: Vec<usize>,
	pub error: Option<String>,
}

#[derive(Debug)]
pub struct SampleQueueJob {
	units: Option<Vec<SampleUnit>>,
	build_error: Option<&'static str>,
	worker_count: Option<usize>,
	report: Arc<Mutex<FinishedReport>>,
}

impl SampleQueueJob {
	pub fn new(units: Vec<SampleUnit>) -> (Self, Arc<Mutex<FinishedReport>>) {
		let report = Arc::default();
		(
			Self {
				units: Some(units),
				build_error: None,
				worker_count: None,
				report: Arc::clone(&report),
			},
			report,
		)
	}

	/// Fails while building its units, so no unit ever runs
	pub fn with_build_error(mut self, message: &'static str) -> Self {
		self.build_error = Some(message);
		self
	}

	pub fn with_worker_count(mut self, worker_count: usize) -> Self {
		self.worker_count = Some(worker_count);
		self
	}
}

#[async_trait]
impl QueueJob for SampleQueueJob {
	type Error = SampleError;
	type Unit = SampleUnit;

	async fn build_units(&mut self, _ctx: &JobContext) -> Result<Vec<SampleUnit>, SampleError> {
		if let Some(message) = self.build_error {
			return Err(SampleError::new(message));
		}

		self.units
			.take()
			.ok_or_else(|| SampleError::new("units were already built"))
	}

	fn status_suffix(&self) -> String {
		"files".to_string()
	}

	fn worker_count(&self) -> Option<usize> {
		self.worker_count
	}

	async fn on_finished(
		&mut self,
		_ctx: &JobContext,
		completed: Vec<SampleUnit>,
		error: Option<&QueueJobError<SampleError>>,
	) {
		let mut report = self.report.lock().unwrap();
		report.calls += 1;
		report.completed = completed.iter().map(|unit| unit.id).collect();
		report.error = error.map(ToString::to_string);
	}
}

#[derive(Debug)]
pub struct UploadUnit {
	file: String,
	fail: bool,
}

#[async_trait]
impl JobUnit<SampleError> for UploadUnit {
	async fn execute(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		sleep(Duration::from_millis(5)).await;

		if self.fail {
			Err(SampleError::new(format!("failed to upload {}", self.file)))
		} else {
			Ok(ExecStatus::Done)
		}
	}
}

/// Uploads a bunch of files, one of them fails on the first attempt. Resuming only uploads the
/// files that weren't uploaded yet.
#[derive(Debug)]
pub struct UploadFilesJob {
	files: Vec<String>,
	uploaded: HashSet<String>,
	fail_once: Option<String>,
}

impl UploadFilesJob {
	pub fn new(count: usize, fail_once: usize) -> Self {
		let files = (0..count).map(|i| format!("file-{i}")).collect::<Vec<_>>();
		let fail_once = files.get(fail_once).cloned();

		Self {
			files,
			uploaded: HashSet::new(),
			fail_once,
		}
	}

	fn update_title(&self, ctx: &JobContext) {
		let verb = if self.uploaded.len() == self.files.len() {
			"Uploaded"
		} else {
			"Uploading"
		};

		ctx.set_title(format!("{verb} {} Files", self.files.len()));
	}
}

#[async_trait]
impl QueueJob for UploadFilesJob {
	type Error = SampleError;
	type Unit = UploadUnit;

	async fn build_units(&mut self, ctx: &JobContext) -> Result<Vec<UploadUnit>, SampleError> {
		self.update_title(ctx);

		let failing = self.fail_once.take();

		Ok(self
			.files
			.iter()
			.filter(|file| !self.uploaded.contains(*file))
			.map(|file| UploadUnit {
				file: file.clone(),
				fail: failing.as_ref() == Some(file),
			})
			.collect())
	}

	fn status_suffix(&self) -> String {
		"files".to_string()
	}

	fn worker_count(&self) -> Option<usize> {
		Some(3)
	}

	async fn on_finished(
		&mut self,
		ctx: &JobContext,
		completed: Vec<UploadUnit>,
		_error: Option<&QueueJobError<SampleError>>,
	) {
		self.uploaded
			.extend(completed.into_iter().map(|unit| unit.file));

		self.update_title(ctx);
	}

	fn can_resume(&self) -> bool {
		self.uploaded.len() != self.files.len()
	}
}
