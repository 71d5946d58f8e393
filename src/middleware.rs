//! Store middleware: inspect, substitute or veto a proposed state transition.

use tracing::{debug, trace};

/// What a [`Middleware`] decided about a candidate state.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<S> {
	/// Pass the candidate on unchanged.
	Continue,
	/// Pass this state on instead.
	Replace(S),
	/// Drop the whole update. Nothing is committed and nobody is notified.
	Veto,
}

/// Runs in registration order on every [`Store::set_state`](`crate::store::Store::set_state`).
/// Each middleware sees the candidate as left by the ones before it.
pub trait Middleware<S> {
	fn process(&mut self, action: &str, previous: &S, candidate: &S) -> Verdict<S>;
}
impl<S, F> Middleware<S> for F
where
	F: FnMut(&str, &S, &S) -> Verdict<S>,
{
	fn process(&mut self, action: &str, previous: &S, candidate: &S) -> Verdict<S> {
		self(action, previous, candidate)
	}
}

/// Logs every action passing through at `debug` level, and both states at `trace` level.
#[must_use]
pub fn logging<S: core::fmt::Debug>() -> impl Middleware<S> {
	|action: &str, previous: &S, candidate: &S| {
		debug!("Action {:?}", action);
		if cfg!(feature = "dangerous-logging") {
			trace!("Previous state: {:?}", previous);
			trace!("Candidate state: {:?}", candidate);
		}
		Verdict::Continue
	}
}
