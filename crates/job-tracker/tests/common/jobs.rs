use sd_job_tracker::{check_interruption, ExecStatus, Job, JobContext};

use std::{future::pending, time::Duration};

use async_channel as chan;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
	#[error("{0}")]
	Message(String),
}

impl SampleError {
	pub fn new(message: impl Into<String>) -> Self {
		Self::Message(message.into())
	}
}

#[derive(Debug, Default)]
pub struct ReadyJob;

#[async_trait]
impl Job for ReadyJob {
	type Error = SampleError;

	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		ctx.set_status("Done");
		Ok(ExecStatus::Done)
	}
}

#[derive(Debug)]
pub struct BogusJob {
	message: &'static str,
}

impl BogusJob {
	pub const fn new(message: &'static str) -> Self {
		Self { message }
	}
}

#[async_trait]
impl Job for BogusJob {
	type Error = SampleError;

	async fn run(&mut self, _ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		Err(SampleError::new(self.message))
	}
}

/// Only stops when interrupted
#[derive(Debug, Default)]
pub struct NeverJob;

#[async_trait]
impl Job for NeverJob {
	type Error = SampleError;

	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		ctx.interrupter().await;
		info!("Canceling NeverJob <id='{}'>", ctx.id());
		Ok(ExecStatus::Canceled)
	}
}

/// Ignores interruptions, so it can only be stopped by forced abortion
#[derive(Debug, Default)]
pub struct StubbornJob;

#[async_trait]
impl Job for StubbornJob {
	type Error = SampleError;

	async fn run(&mut self, _ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		pending().await
	}
}

/// Gives up by itself, without anyone asking it to
#[derive(Debug, Default)]
pub struct QuitterJob;

#[async_trait]
impl Job for QuitterJob {
	type Error = SampleError;

	async fn run(&mut self, _ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		Ok(ExecStatus::Canceled)
	}
}

#[derive(Debug, Default)]
pub struct PanicJob;

#[async_trait]
impl Job for PanicJob {
	type Error = SampleError;

	async fn run(&mut self, _ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		panic!("PanicJob always panics");
	}
}

/// Advances its progress one step each 10ms, checking for interruptions between steps
#[derive(Debug)]
pub struct StepsJob {
	steps: u64,
}

impl StepsJob {
	pub const fn new(steps: u64) -> Self {
		Self { steps }
	}
}

#[async_trait]
impl Job for StepsJob {
	type Error = SampleError;

	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		ctx.set_progress_range(0, self.steps);

		for step in 1..=self.steps {
			check_interruption!(ctx.interrupter());

			sleep(Duration::from_millis(10)).await;
			ctx.set_progress_value(step);
			ctx.set_status(format!("Step {step}"));
		}

		Ok(ExecStatus::Done)
	}
}

/// Keeps writing its status after being interrupted
#[derive(Debug)]
pub struct ChattyJob {
	began_tx: chan::Sender<()>,
}

impl ChattyJob {
	pub fn new() -> (Self, chan::Receiver<()>) {
		let (began_tx, began_rx) = chan::bounded(1);
		(Self { began_tx }, began_rx)
	}
}

#[async_trait]
impl Job for ChattyJob {
	type Error = SampleError;

	async fn run(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		self.began_tx.send(()).await.expect("began channel closed");

		ctx.interrupter().await;

		ctx.set_status("Still chatting");
		ctx.set_progress_value(1);

		Ok(ExecStatus::Done)
	}
}

/// Fails on its first run, resuming waits for a signal and then succeeds
#[derive(Debug)]
pub struct ResumableJob {
	release_rx: chan::Receiver<()>,
	is_done: bool,
}

impl ResumableJob {
	pub fn new() -> (Self, chan::Sender<()>) {
		let (release_tx, release_rx) = chan::bounded(1);
		(
			Self {
				release_rx,
				is_done: false,
			},
			release_tx,
		)
	}
}

#[async_trait]
impl Job for ResumableJob {
	type Error = SampleError;

	async fn run(&mut self, _ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		Err(SampleError::new("connection reset"))
	}

	async fn resume(&mut self, ctx: &JobContext) -> Result<ExecStatus, SampleError> {
		self.release_rx
			.recv()
			.await
			.map_err(|_| SampleError::new("release channel closed"))?;

		self.is_done = true;
		ctx.set_status("Resumed");

		Ok(ExecStatus::Done)
	}

	fn can_resume(&self) -> bool {
		!self.is_done
	}
}
