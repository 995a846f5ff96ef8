//! In-process doubles for the relay and the ancillary sink.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;

use crate::common::StreamName;
use crate::outcome::{AncillaryFailure, AncillarySink};
use crate::relay::{LivePath, LivePaths, Relay, RelayError};



#[derive(Clone)]
#[derive(Debug, PartialEq)]
pub enum RelayCall {
	Register { name: StreamName, source_url: String, at: Instant },
	Unregister { name: StreamName },
	List,
}

#[derive(Default)]
struct FakeRelayState {
	reachable_at: Option<Instant>,
	paths: HashMap<StreamName, LivePath>,
	reject_register: Option<(u16, String)>,
	reject_unregister: Option<(u16, String)>,
	calls: Vec<RelayCall>,
}

/// Relay double. Unreachable until `reachable_at`; registered paths show up as not ready.
pub struct FakeRelay {
	state: Mutex<FakeRelayState>,
}

impl FakeRelay {
	pub fn reachable() -> Self {
		Self::reachable_from(Instant::now())
	}

	pub fn unreachable() -> Self {
		FakeRelay { state: Mutex::new(FakeRelayState::default()) }
	}

	pub fn reachable_from(at: Instant) -> Self {
		let relay = Self::unreachable();
		relay.state.lock().unwrap().reachable_at = Some(at);
		relay
	}

	pub fn set_live(&self, name: &str, ready: bool) {
		let path = LivePath { name: name.to_string(), ready, source: None, readers: Vec::new() };
		self.state.lock().unwrap().paths.insert(name.to_string(), path);
	}

	pub fn reject_register(&self, status: u16, message: &str) {
		self.state.lock().unwrap().reject_register = Some((status, message.to_string()));
	}

	pub fn reject_unregister(&self, status: u16, message: &str) {
		self.state.lock().unwrap().reject_unregister = Some((status, message.to_string()));
	}

	pub fn calls(&self) -> Vec<RelayCall> {
		self.state.lock().unwrap().calls.clone()
	}

	pub fn registrations(&self) -> Vec<(StreamName, Instant)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				RelayCall::Register { name, at, .. } => Some((name, at)),
				_ => None,
			})
			.collect()
	}

	pub fn has_path(&self, name: &str) -> bool {
		self.state.lock().unwrap().paths.contains_key(name)
	}

	fn check_reachable(state: &FakeRelayState) -> Result<(), RelayError> {
		match state.reachable_at {
			Some(at) if Instant::now() >= at => Ok(()),
			_ => Err(RelayError::InvalidResponse("fake relay is down".to_string())),
		}
	}
}

#[rocket::async_trait]
impl Relay for FakeRelay {
	async fn register_path(&self, name: &str, source_url: &str) -> Result<(), RelayError> {
		let mut state = self.state.lock().unwrap();
		state.calls.push(RelayCall::Register {
			name: name.to_string(),
			source_url: source_url.to_string(),
			at: Instant::now(),
		});
		Self::check_reachable(&state)?;
		if let Some((status, message)) = state.reject_register.clone() {
			return Err(RelayError::Rejected { status, message });
		}
		state.paths
			.entry(name.to_string())
			.or_insert_with(|| LivePath { name: name.to_string(), ready: false, source: None, readers: Vec::new() });
		Ok(())
	}

	async fn unregister_path(&self, name: &str) -> Result<(), RelayError> {
		let mut state = self.state.lock().unwrap();
		state.calls.push(RelayCall::Unregister { name: name.to_string() });
		Self::check_reachable(&state)?;
		if let Some((status, message)) = state.reject_unregister.clone() {
			return Err(RelayError::Rejected { status, message });
		}
		state.paths.remove(name);
		Ok(())
	}

	async fn list_live_paths(&self) -> Result<LivePaths, RelayError> {
		let mut state = self.state.lock().unwrap();
		state.calls.push(RelayCall::List);
		Self::check_reachable(&state)?;
		Ok(state.paths.clone())
	}
}


#[derive(Default)]
pub struct RecordingSink {
	messages: Mutex<Vec<String>>,
}

impl RecordingSink {
	pub fn messages(&self) -> Vec<String> {
		self.messages.lock().unwrap().clone()
	}
}

impl AncillarySink for RecordingSink {
	fn report(&self, failure: &AncillaryFailure) {
		self.messages.lock().unwrap().push(failure.to_string());
	}
}
