//! Idle automation: small presence actions against a live session.

use std::f32::consts::PI;
use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::client::{Control, GameSession};
use crate::timer::TimerHandle;

/// Probabilities driving the idle actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdlePolicy {
	/// Chance per tick of a short jump, in `[0, 1]`.
	pub jump_chance: f64,
}

impl Default for IdlePolicy {
	fn default() -> Self {
		Self { jump_chance: 0.2 }
	}
}

/// Actions for one idle tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleAction {
	pub yaw: f32,
	pub pitch: f32,
	pub jump: bool,
}

impl IdlePolicy {
	/// Picks a look direction within a half turn of straight ahead, and
	/// whether to jump.
	pub fn next_action<R: Rng + ?Sized>(&self, rng: &mut R) -> IdleAction {
		let half = PI / 2.0;
		IdleAction {
			yaw: rng.random_range(-half..half),
			pitch: rng.random_range(-half..half),
			jump: rng.random_bool(self.jump_chance.clamp(0.0, 1.0)),
		}
	}
}

/// Spawns the idle loop for `session`.
///
/// The loop holds only a weak reference: once the owner drops the session a
/// tick does nothing. Ticks are also skipped while the session has no world
/// entity.
pub(crate) fn spawn_loop(
	token: u64,
	session: &Arc<dyn GameSession>,
	policy: IdlePolicy,
	interval: Duration,
	jump_pulse: Duration,
) -> TimerHandle {
	let session: Weak<dyn GameSession> = Arc::downgrade(session);
	let mut ticker = time::interval_at(Instant::now() + interval, interval);
	let task = tokio::spawn(async move {
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			ticker.tick().await;
			let jumped = {
				let Some(live) = session.upgrade() else {
					continue;
				};
				if !live.has_entity() {
					continue;
				}
				let action = policy.next_action(&mut rand::rng());
				live.look(action.yaw, action.pitch);
				if action.jump {
					live.set_control(Control::Jump, true);
				}
				live.swing_arm();
				action.jump
			};
			if jumped {
				let _release = JumpRelease(session.clone());
				time::sleep(jump_pulse).await;
			}
		}
	});
	TimerHandle::from_task(token, task)
}

/// Lets go of the jump control when dropped, including when the loop is
/// aborted mid-pulse.
struct JumpRelease(Weak<dyn GameSession>);

impl Drop for JumpRelease {
	fn drop(&mut self) {
		if let Some(live) = self.0.upgrade() {
			live.set_control(Control::Jump, false);
		}
	}
}
