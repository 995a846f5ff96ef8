use std::collections::HashMap;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::ServiceError;



pub type StreamName = String;
pub type StreamList = Vec<StreamRecord>;
pub type StreamMap = HashMap<StreamName, StreamRecord>;

pub const MAX_NAME_LEN: usize = 50;
pub const GENERATED_NAME_PREFIX: &str = "cam-";
pub const ALLOWED_SCHEMES: [&str; 2] = ["rtsp://", "rtsps://"];

#[derive(Clone, Copy)]
#[derive(Debug, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
	#[default]
	Connecting,
	Online,
	Offline,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
	pub name: StreamName,
	pub label: String,
	pub rtsp_url: String,
	// Last known value; recomputed from the relay on every list.
	#[serde(default)]
	pub status: StreamStatus,
	pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
#[derive(Debug, Default)]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStreamRequest {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub label: String,
	#[serde(default)]
	pub rtsp_url: String,
}


/// Turns operator input into a relay path name: lowercase, spaces become hyphens,
/// anything outside `[a-zA-Z0-9_-]` is dropped and the result is capped at `MAX_NAME_LEN`.
pub fn normalize_name(raw: &str) -> StreamName {
	let mut name: String = raw
		.trim()
		.to_lowercase()
		.replace(' ', "-")
		.chars()
		.filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
		.collect();
	// Only ASCII survives the filter, so byte truncation is safe.
	name.truncate(MAX_NAME_LEN);
	name
}

pub fn generated_name(now: DateTime<Utc>) -> StreamName {
	format!("{}{}", GENERATED_NAME_PREFIX, now.timestamp_millis())
}

pub fn resolve_name(raw: &str, now: DateTime<Utc>) -> StreamName {
	let name = normalize_name(raw);
	if name.is_empty() {
		generated_name(now)
	} else {
		name
	}
}

pub fn validate_source_url(url: &str) -> Result<(), ServiceError> {
	if url.is_empty() {
		return Err(ServiceError::Validation("rtspUrl is required".to_string()));
	}
	if !ALLOWED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
		return Err(ServiceError::Validation("URL must start with rtsp:// or rtsps://".to_string()));
	}
	Ok(())
}

/// Source URL safe for logs: any password is masked.
pub fn redact_credentials(source: &str) -> String {
	match Url::parse(source) {
		Ok(mut url) if url.password().is_some() => {
			let _ = url.set_password(Some("***"));
			url.to_string()
		},
		_ => source.to_string(),
	}
}
