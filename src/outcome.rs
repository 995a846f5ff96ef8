//! Primary results paired with the best-effort side effects that failed
//! along the way (snapshot writes, relay cleanup on delete).

use log::warn;

use crate::common::StreamName;
use crate::relay::RelayError;
use crate::store::StoreError;



#[derive(Debug, thiserror::Error)]
pub enum AncillaryFailure {
	#[error("failed to persist stream snapshot: {0}")]
	Persist(#[from] StoreError),

	#[error("relay cleanup failed for {name}: {source}")]
	RelayCleanup {
		name: StreamName,
		#[source]
		source: RelayError,
	},
}

#[must_use]
#[derive(Debug)]
pub struct Outcome<T> {
	pub value: T,
	pub ancillary: Vec<AncillaryFailure>,
}

impl<T> Outcome<T> {
	pub fn ok(value: T) -> Self {
		Outcome { value, ancillary: Vec::new() }
	}

	pub fn with_failure(mut self, failure: AncillaryFailure) -> Self {
		self.ancillary.push(failure);
		self
	}

	pub fn merge<U>(mut self, other: Outcome<U>) -> (Self, U) {
		self.ancillary.extend(other.ancillary);
		(self, other.value)
	}

	/// Hands every ancillary failure to `sink` and returns the primary value.
	pub fn report(self, sink: &dyn AncillarySink) -> T {
		for failure in &self.ancillary {
			sink.report(failure);
		}
		self.value
	}
}

pub trait AncillarySink: Send + Sync {
	fn report(&self, failure: &AncillaryFailure);
}

pub struct LogSink;

impl AncillarySink for LogSink {
	fn report(&self, failure: &AncillaryFailure) {
		warn!("{}", failure);
	}
}
