use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use log::{info, warn};

use crate::common::{StreamList, StreamMap, StreamName, StreamRecord, StreamStatus};
use crate::outcome::{AncillaryFailure, Outcome};



#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("serialization error: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Registered streams keyed by name, mirrored to a JSON snapshot file on every mutation.
pub struct StreamStore {
	// tokio's RwLock lets list/get calls share the map while a waiting writer
	// still keeps new readers from starving it.
	streams: RwLock<StreamMap>,
	snapshot_path: PathBuf,
	// Orders snapshot writes so the file always ends up with the newest state.
	persist_lock: Mutex<()>,
}

impl StreamStore {
	/// Loads the snapshot at `path`. A missing or unreadable snapshot starts an empty store.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let snapshot_path = path.into();
		let streams = read_snapshot_file(&snapshot_path);
		Self::with_streams(snapshot_path, streams)
	}

	fn with_streams(snapshot_path: PathBuf, streams: StreamMap) -> Self {
		StreamStore {
			streams: RwLock::new(streams),
			snapshot_path,
			persist_lock: Mutex::new(()),
		}
	}

	pub fn snapshot_path(&self) -> &Path {
		&self.snapshot_path
	}

	/// Inserts or replaces the record under its name. Uniqueness is the caller's business.
	pub async fn add(&self, record: StreamRecord) -> Outcome<()> {
		{
			let mut streams = self.streams.write().await;
			streams.insert(record.name.clone(), record);
		}
		self.persist_outcome().await
	}

	pub async fn get(&self, name: &str) -> Option<StreamRecord> {
		let streams = self.streams.read().await;
		streams.get(name).cloned()
	}

	/// All records, in no particular order.
	pub async fn list(&self) -> StreamList {
		let streams = self.streams.read().await;
		streams.values().cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.streams.read().await.len()
	}

	/// Removes `name` if present and returns the removed record. Absent names are a no-op.
	pub async fn delete(&self, name: &str) -> Outcome<Option<StreamRecord>> {
		let removed = {
			let mut streams = self.streams.write().await;
			streams.remove(name)
		};
		let (outcome, _) = Outcome::ok(removed).merge(self.persist_outcome().await);
		outcome
	}

	/// Updates the last known status of records that still exist. Not persisted on its own.
	pub async fn record_statuses(&self, statuses: &HashMap<StreamName, StreamStatus>) {
		let mut streams = self.streams.write().await;
		for (name, status) in statuses {
			if let Some(record) = streams.get_mut(name) {
				record.status = *status;
			}
		}
	}

	/// Writes the full record set to the snapshot file, replacing it atomically.
	pub async fn persist(&self) -> Result<(), StoreError> {
		let _guard = self.persist_lock.lock().await;
		let snapshot = self.list().await;
		write_snapshot_file(&self.snapshot_path, &snapshot).await?;
		info!("Wrote {} streams to {}", snapshot.len(), self.snapshot_path.display());
		Ok(())
	}

	async fn persist_outcome(&self) -> Outcome<()> {
		match self.persist().await {
			Ok(()) => Outcome::ok(()),
			Err(err) => Outcome::ok(()).with_failure(AncillaryFailure::Persist(err)),
		}
	}
}



fn read_snapshot_file(path: &Path) -> StreamMap {
	let file = match File::open(path) {
		Ok(file) => file,
		Err(err) => {
			// Expected on a fresh deployment, before the first snapshot is written
			warn!("Failed to open stream snapshot {} for reading; error was {}", path.display(), err);
			return StreamMap::new();
		}
	};

	let records: StreamList = match serde_json::from_reader(BufReader::new(file)) {
		Ok(records) => records,
		Err(err) => {
			warn!("Failed to parse stream snapshot {}; starting empty. Error was {}", path.display(), err);
			return StreamMap::new();
		}
	};

	let streams: StreamMap = records
		.into_iter()
		.map(|record| (record.name.clone(), record))
		.collect();
	info!("Loaded {} streams from {}", streams.len(), path.display());
	streams
}

async fn write_snapshot_file(path: &Path, records: &StreamList) -> Result<(), StoreError> {
	let json = serde_json::to_vec_pretty(records)?;

	if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(dir).await?;
	}

	let tmp_path = temp_path_for(path);
	let file = tokio::fs::File::create(&tmp_path).await?;
	let mut writer = tokio::io::BufWriter::new(file);
	writer.write_all(&json).await?;
	writer.flush().await?;
	writer.get_ref().sync_all().await?;
	drop(writer);

	tokio::fs::rename(&tmp_path, path).await?;
	Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	name.push(".tmp");
	path.with_file_name(name)
}
