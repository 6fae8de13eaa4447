use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKER_COUNT: usize = 5;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SHUTDOWN_PASSES: usize = 5;
pub const DEFAULT_SHUTDOWN_JOIN_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_CANCEL_GRACE_PERIOD_MS: u64 = 1000;

/// Tuning knobs for running jobs.
///
/// Every field is optional when deserializing, missing ones fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Amount of workers a queue processing job spawns when it doesn't choose one itself,
	/// always capped by the amount of units in the queue.
	pub default_worker_count: usize,
	/// How long the queue coordinator sleeps between progress and failure checks, unless a
	/// worker wakes it up earlier.
	pub poll_interval_ms: u64,
	/// How many times we try to join still running workers after a failure or cancellation.
	pub shutdown_passes: usize,
	/// For how long each of those join attempts waits before aborting the worker.
	pub shutdown_join_timeout_ms: u64,
	/// After a cancel request, how long a job may keep running before being forcefully aborted.
	pub cancel_grace_period_ms: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			default_worker_count: DEFAULT_WORKER_COUNT,
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			shutdown_passes: DEFAULT_SHUTDOWN_PASSES,
			shutdown_join_timeout_ms: DEFAULT_SHUTDOWN_JOIN_TIMEOUT_MS,
			cancel_grace_period_ms: DEFAULT_CANCEL_GRACE_PERIOD_MS,
		}
	}
}

impl Config {
	#[must_use]
	pub const fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	#[must_use]
	pub const fn shutdown_join_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_join_timeout_ms)
	}

	#[must_use]
	pub const fn cancel_grace_period(&self) -> Duration {
		Duration::from_millis(self.cancel_grace_period_ms)
	}
}
