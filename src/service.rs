use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::common::{self, AddStreamRequest, StreamList, StreamName, StreamRecord, StreamStatus};
use crate::error::ServiceError;
use crate::outcome::{AncillaryFailure, AncillarySink, LogSink, Outcome};
use crate::relay::{Reachability, Relay};
use crate::store::StreamStore;



/// Composes the store and the relay for each operator request.
///
/// Same-name requests are not sequenced: a concurrent add and delete of one
/// name race between the relay call and the store write, and whichever
/// finishes last wins.
pub struct StreamService {
	store: Arc<StreamStore>,
	relay: Arc<dyn Relay>,
	sink: Arc<dyn AncillarySink>,
}

impl StreamService {
	pub fn new(store: Arc<StreamStore>, relay: Arc<dyn Relay>) -> Self {
		Self::with_sink(store, relay, Arc::new(LogSink))
	}

	pub fn with_sink(store: Arc<StreamStore>, relay: Arc<dyn Relay>, sink: Arc<dyn AncillarySink>) -> Self {
		StreamService { store, relay, sink }
	}

	pub fn store(&self) -> &Arc<StreamStore> {
		&self.store
	}

	pub async fn add_stream(&self, request: AddStreamRequest) -> Result<StreamRecord, ServiceError> {
		common::validate_source_url(&request.rtsp_url)?;

		let now = Utc::now();
		let name = common::resolve_name(&request.name, now);

		if self.store.get(&name).await.is_some() {
			return Err(ServiceError::Conflict(format!("Stream '{}' already exists", name)));
		}

		// The relay has to accept the path before the store learns about it.
		if let Err(err) = self.relay.register_path(&name, &request.rtsp_url).await {
			if err.is_unreachable() {
				warn!("Relay unreachable while adding {}: {}", name, err);
			} else {
				warn!("Relay refused {}: {}", name, err);
			}
			return Err(err.into());
		}

		let label = if request.label.is_empty() { name.clone() } else { request.label };
		let record = StreamRecord {
			name,
			label,
			rtsp_url: request.rtsp_url,
			status: StreamStatus::Connecting,
			created_at: now,
		};
		self.store.add(record.clone()).await.report(self.sink.as_ref());

		info!("Added stream: {} -> {}", record.name, common::redact_credentials(&record.rtsp_url));
		Ok(record)
	}

	/// Stored streams with status taken from the relay. If the relay can't be
	/// asked, the last known status is returned instead.
	pub async fn list_streams(&self) -> StreamList {
		let mut streams = self.store.list().await;

		match self.relay.list_live_paths().await {
			Ok(paths) => {
				let mut statuses = HashMap::with_capacity(streams.len());
				for stream in streams.iter_mut() {
					let live = paths.get(&stream.name);
					if let Some(path) = live {
						debug!(
							"Path {}: ready={} source={} readers={}",
							path.name,
							path.ready,
							path.source.as_ref().map_or("none", |s| s.kind.as_str()),
							path.reader_count()
						);
					}
					stream.status = StreamStatus::from_live_path(live);
					statuses.insert(stream.name.clone(), stream.status);
				}
				self.store.record_statuses(&statuses).await;
			},
			Err(err) => {
				warn!("Could not fetch live paths; returning last known status: {}", err);
			},
		}

		streams
	}

	pub async fn delete_stream(&self, name: &str) -> Result<StreamName, ServiceError> {
		if name.is_empty() {
			return Err(ServiceError::Validation("Stream name is required".to_string()));
		}
		if self.store.get(name).await.is_none() {
			return Err(ServiceError::NotFound("Stream not found".to_string()));
		}

		let mut outcome = Outcome::ok(name.to_string());
		if let Err(source) = self.relay.unregister_path(name).await {
			outcome = outcome.with_failure(AncillaryFailure::RelayCleanup {
				name: name.to_string(),
				source,
			});
		}
		let (outcome, _) = outcome.merge(self.store.delete(name).await);
		let deleted = outcome.report(self.sink.as_ref());

		info!("Deleted stream: {}", deleted);
		Ok(deleted)
	}

	pub async fn health(&self) -> Reachability {
		self.relay.ping().await
	}
}
