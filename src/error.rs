use rocket::http::Status;

use crate::relay::RelayError;



/// Failures an operator request can end with. Anything not listed here is
/// absorbed and reported as an ancillary failure instead.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	NotFound(String),

	#[error(transparent)]
	Relay(#[from] RelayError),
}

impl ServiceError {
	pub fn status(&self) -> Status {
		match self {
			ServiceError::Validation(_) => Status::BadRequest,
			ServiceError::Conflict(_) => Status::Conflict,
			ServiceError::NotFound(_) => Status::NotFound,
			ServiceError::Relay(_) => Status::BadGateway,
		}
	}
}
