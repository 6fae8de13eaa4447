use std::{
	future::{Future, IntoFuture},
	pin::Pin,
	task::{Context, Poll},
};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::trace;

pin_project_lite::pin_project! {
	/// Intermediate struct to wait until a cancel command is sent by the user.
	#[must_use = "`InterrupterFuture` does nothing unless polled"]
	pub struct InterrupterFuture<'token> {
		#[pin]
		fut: WaitForCancellationFuture<'token>,
	}
}

impl Future for InterrupterFuture<'_> {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();

		match this.fut.poll(cx) {
			Poll::Ready(()) => {
				trace!("Running job received interruption request");
				Poll::Ready(())
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// We use an [`IntoFuture`] implementation to allow the user to use the `await` syntax on the
/// [`Interrupter`] object, so long running units can race their work against a cancel request.
impl<'token> IntoFuture for &'token Interrupter {
	type Output = ();

	type IntoFuture = InterrupterFuture<'token>;

	fn into_future(self) -> Self::IntoFuture {
		InterrupterFuture {
			fut: self.token.cancelled(),
		}
	}
}

/// A helper object that can be used to check if the user requested a cancel, so the job `run`
/// implementation (and each of its units) can decide the appropriated moment to stop.
///
/// Interrupters form a tree, interrupting a parent also interrupts all of its children, but not
/// the other way around. Queue processing jobs use a child interrupter to stop their workers
/// after a failure without touching the job's own interrupter.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
	token: CancellationToken,
}

impl Interrupter {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
		}
	}

	pub(crate) fn interrupt(&self) {
		self.token.cancel();
	}

	/// Check if the user requested a cancel, in a non-blocking manner.
	#[must_use]
	pub fn is_interrupted(&self) -> bool {
		self.token.is_cancelled()
	}
}

/// Returns early with `Ok(ExecStatus::Canceled)` if a cancel was requested.
#[macro_export]
macro_rules! check_interruption {
	($interrupter:expr) => {
		let interrupter: &$crate::Interrupter = $interrupter;

		if interrupter.is_interrupted() {
			::tracing::trace!("Job was canceled by the user");
			return Ok($crate::ExecStatus::Canceled);
		}
	};
}
