//! Cancelable timer handles and the supervisor's timing constants.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Fixed delays and intervals used by every supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
	/// Delay between a session ending and the automatic reconnect.
	pub reconnect_delay: Duration,
	/// Pause between the stop and start halves of a restart.
	pub restart_delay: Duration,
	/// Period of the "Uptime" log while online.
	pub heartbeat_interval: Duration,
	/// Period of the idle loop.
	pub idle_interval: Duration,
	/// How long an idle jump holds the control.
	pub jump_pulse: Duration,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			reconnect_delay: Duration::from_secs(10),
			restart_delay: Duration::from_secs(2),
			heartbeat_interval: Duration::from_secs(60),
			idle_interval: Duration::from_secs(5),
			jump_pulse: Duration::from_millis(500),
		}
	}
}

/// Owned handle to a spawned timer task. Dropping it cancels the task.
///
/// Each handle carries a token so a firing timer can tell whether it is still
/// the one its owner holds.
#[derive(Debug)]
pub struct TimerHandle {
	token: u64,
	task: Option<JoinHandle<()>>,
}

impl TimerHandle {
	/// Runs `fire` once, `delay` after this call.
	pub fn after<F>(token: u64, delay: Duration, fire: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		let deadline = Instant::now() + delay;
		let task = tokio::spawn(async move {
			time::sleep_until(deadline).await;
			fire();
		});
		Self {
			token,
			task: Some(task),
		}
	}

	/// Runs `tick` every `period`, first one full period after this call.
	///
	/// The loop ends when `tick` returns `false`.
	pub fn every<F>(token: u64, period: Duration, mut tick: F) -> Self
	where
		F: FnMut() -> bool + Send + 'static,
	{
		let mut ticker = time::interval_at(Instant::now() + period, period);
		let task = tokio::spawn(async move {
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				if !tick() {
					break;
				}
			}
		});
		Self {
			token,
			task: Some(task),
		}
	}

	/// Wraps an already spawned task.
	pub fn from_task(token: u64, task: JoinHandle<()>) -> Self {
		Self {
			token,
			task: Some(task),
		}
	}

	pub fn token(&self) -> u64 {
		self.token
	}

	/// Releases the handle without cancelling the task.
	///
	/// Used by a timer that is clearing its own slot while it runs.
	pub fn detach(mut self) {
		self.task.take();
	}
}

impl Drop for TimerHandle {
	fn drop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}
