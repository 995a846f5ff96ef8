//! One-shot startup restore: wait for the relay, then replay every stored
//! stream into it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{interval, MissedTickBehavior};

use crate::relay::Relay;
use crate::store::StreamStore;



pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileState {
	Waiting { attempt: u32 },
	Reconciling,
	Done { restored: usize, total: usize },
	TimedOut { attempts: u32 },
	Cancelled,
}

impl ReconcileState {
	pub fn is_terminal(self) -> bool {
		matches!(self, ReconcileState::Done { .. } | ReconcileState::TimedOut { .. } | ReconcileState::Cancelled)
	}
}

pub struct Reconciler {
	store: Arc<StreamStore>,
	relay: Arc<dyn Relay>,
	interval: Duration,
	max_attempts: u32,
}

impl Reconciler {
	pub fn new(store: Arc<StreamStore>, relay: Arc<dyn Relay>) -> Self {
		Reconciler {
			store,
			relay,
			interval: DEFAULT_INTERVAL,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
		}
	}

	pub fn with_schedule(mut self, interval: Duration, max_attempts: u32) -> Self {
		self.interval = interval;
		self.max_attempts = max_attempts;
		self
	}

	/// Runs until the restore finishes, the attempt budget runs out, or `cancel` resolves.
	pub async fn run<C>(self, cancel: C) -> ReconcileState
	where
		C: Future<Output = ()>,
	{
		tokio::pin!(cancel);
		let state = tokio::select! {
			state = self.drive() => state,
			_ = &mut cancel => {
				info!("Relay restore cancelled by shutdown");
				ReconcileState::Cancelled
			},
		};
		debug!("Relay restore finished in state {:?}", state);
		state
	}

	async fn drive(&self) -> ReconcileState {
		let mut state = ReconcileState::Waiting { attempt: 0 };
		let mut ticker = interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		while !state.is_terminal() {
			state = match state {
				ReconcileState::Waiting { attempt } if attempt >= self.max_attempts => {
					warn!("Relay API not reachable after {} attempts; stored streams were not restored", attempt);
					ReconcileState::TimedOut { attempts: attempt }
				},
				ReconcileState::Waiting { attempt } => {
					ticker.tick().await;
					if self.relay.ping().await.is_reachable() {
						info!("Relay API is reachable");
						ReconcileState::Reconciling
					} else {
						debug!("Relay API not reachable yet (attempt {}/{})", attempt + 1, self.max_attempts);
						ReconcileState::Waiting { attempt: attempt + 1 }
					}
				},
				ReconcileState::Reconciling => self.restore_all().await,
				terminal => terminal,
			};
		}
		state
	}

	async fn restore_all(&self) -> ReconcileState {
		let streams = self.store.list().await;
		let total = streams.len();
		let mut restored = 0;

		for stream in &streams {
			match self.relay.register_path(&stream.name, &stream.rtsp_url).await {
				Ok(()) => restored += 1,
				Err(err) => warn!("Restore failed for {}: {}", stream.name, err),
			}
		}

		if total > 0 {
			info!("Restored {}/{} streams to relay", restored, total);
		}
		ReconcileState::Done { restored, total }
	}
}
