use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use std::time::Duration;

/// Delay schedule for re-establishing a connection or retrying a failed step.
///
/// Delays grow exponentially with jitter and never give up. Call `reset` once the connection
/// has proven healthy so the next outage starts from the initial interval again.
#[derive(Debug, Clone)]
pub struct Reconnect {
	policy: ExponentialBackoff,
}

impl Reconnect {
	pub fn new(initial_interval: Duration) -> Self {
		Self {
			policy: ExponentialBackoff {
				initial_interval,
				current_interval: initial_interval,
				max_elapsed_time: None,
				..ExponentialBackoff::default()
			},
		}
	}

	pub fn next_delay(&mut self) -> Duration {
		self.policy
			.next_backoff()
			.unwrap_or(self.policy.max_interval)
	}

	pub fn reset(&mut self) {
		self.policy.reset();
	}
}

impl Default for Reconnect {
	fn default() -> Self {
		Self::new(Duration::from_millis(500))
	}
}
