#![allow(dead_code)]

use sd_job_tracker::{JobEvent, JobHandle};

use std::time::Duration;

use async_channel as chan;
use tokio::time::timeout;

pub mod jobs;
pub mod queue_jobs;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn wait_job(handle: &JobHandle) {
	timeout(TEST_TIMEOUT, handle.wait())
		.await
		.unwrap_or_else(|_| panic!("job <id='{}'> took too long to complete", handle.id()));
}

pub fn drain_events(events_rx: &chan::Receiver<JobEvent>) -> Vec<JobEvent> {
	std::iter::from_fn(|| events_rx.try_recv().ok()).collect()
}
