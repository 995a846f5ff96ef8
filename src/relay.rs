//! Client for the media relay's HTTP control API (MediaMTX v3 paths).
//!
//! The relay owns the live state of every path; this module only turns
//! registration intents into control-API calls and the responses back into
//! [`RelayError`]s and [`LivePaths`].

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use url::Url;

use crate::common::{StreamName, StreamStatus};



pub type LivePaths = HashMap<StreamName, LivePath>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
	/// Transport-level failure: connection refused, DNS, timeout.
	#[error("cannot reach relay API: {0}")]
	Unreachable(#[source] reqwest::Error),

	#[error("relay error {status}: {message}")]
	Rejected { status: u16, message: String },

	#[error("unexpected relay response: {0}")]
	InvalidResponse(String),

	#[error("invalid relay API URL {0}")]
	InvalidUrl(String),

	#[error("failed to build HTTP client: {0}")]
	Client(#[source] reqwest::Error),
}

impl RelayError {
	pub fn is_unreachable(&self) -> bool {
		matches!(self, RelayError::Unreachable(_))
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
pub enum Reachability {
	Reachable,
	Unreachable,
}

impl Reachability {
	pub fn is_reachable(self) -> bool {
		self == Reachability::Reachable
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Reachability::Reachable => "ok",
			Reachability::Unreachable => "unreachable",
		}
	}
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Deserialize)]
pub struct PathSource {
	#[serde(rename = "type")]
	pub kind: String,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Deserialize)]
pub struct LivePath {
	pub name: StreamName,
	#[serde(default)]
	pub ready: bool,
	#[serde(default)]
	pub source: Option<PathSource>,
	#[serde(default)]
	pub readers: Vec<serde_json::Value>,
}

impl LivePath {
	pub fn reader_count(&self) -> usize {
		self.readers.len()
	}
}

#[derive(Deserialize)]
struct PathList {
	#[serde(default)]
	items: Vec<LivePath>,
}

impl StreamStatus {
	pub fn from_live_path(path: Option<&LivePath>) -> StreamStatus {
		match path {
			Some(path) if path.ready => StreamStatus::Online,
			Some(_) => StreamStatus::Connecting,
			None => StreamStatus::Offline,
		}
	}
}


/// Control-plane operations the rest of the service needs from the relay.
#[rocket::async_trait]
pub trait Relay: Send + Sync {
	/// Upserts the path `name` so the relay pulls `source_url` continuously.
	async fn register_path(&self, name: &str, source_url: &str) -> Result<(), RelayError>;

	/// Removes the path. A path the relay doesn't know counts as removed.
	async fn unregister_path(&self, name: &str) -> Result<(), RelayError>;

	async fn list_live_paths(&self) -> Result<LivePaths, RelayError>;

	async fn ping(&self) -> Reachability {
		match self.list_live_paths().await {
			Ok(_) => Reachability::Reachable,
			Err(_) => Reachability::Unreachable,
		}
	}
}


pub struct RelayClient {
	base_url: Url,
	client: reqwest::Client,
}

impl RelayClient {
	pub fn new(api_url: &str, timeout: Duration) -> Result<Self, RelayError> {
		let base_url = Url::parse(api_url.trim_end_matches('/'))
			.map_err(|err| RelayError::InvalidUrl(format!("{}: {}", api_url, err)))?;
		if base_url.cannot_be_a_base() {
			return Err(RelayError::InvalidUrl(api_url.to_string()));
		}

		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(RelayError::Client)?;

		Ok(RelayClient { base_url, client })
	}

	fn endpoint(&self, segments: &[&str]) -> Result<Url, RelayError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| RelayError::InvalidUrl(self.base_url.to_string()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}
}

async fn rejection(response: reqwest::Response) -> RelayError {
	let status = response.status().as_u16();
	let message = response.text().await.unwrap_or_default();
	RelayError::Rejected { status, message: message.trim().to_string() }
}

#[rocket::async_trait]
impl Relay for RelayClient {
	async fn register_path(&self, name: &str, source_url: &str) -> Result<(), RelayError> {
		let url = self.endpoint(&["v3", "config", "paths", "add", name])?;
		let body = json!({
			"source": source_url,
			"sourceOnDemand": false,
		});

		let response = self.client.post(url)
			.json(&body)
			.send()
			.await
			.map_err(RelayError::Unreachable)?;

		if !response.status().is_success() {
			return Err(rejection(response).await);
		}
		Ok(())
	}

	async fn unregister_path(&self, name: &str) -> Result<(), RelayError> {
		let url = self.endpoint(&["v3", "config", "paths", "delete", name])?;

		let response = self.client.delete(url)
			.send()
			.await
			.map_err(RelayError::Unreachable)?;

		let status = response.status();
		if status.is_success() || status == StatusCode::NOT_FOUND {
			return Ok(());
		}
		Err(rejection(response).await)
	}

	async fn list_live_paths(&self) -> Result<LivePaths, RelayError> {
		let url = self.endpoint(&["v3", "paths", "list"])?;

		let response = self.client.get(url)
			.send()
			.await
			.map_err(RelayError::Unreachable)?;

		if !response.status().is_success() {
			return Err(rejection(response).await);
		}

		let list: PathList = response.json()
			.await
			.map_err(|err| RelayError::InvalidResponse(err.to_string()))?;
		Ok(list.items
			.into_iter()
			.map(|path| (path.name.clone(), path))
			.collect())
	}
}
