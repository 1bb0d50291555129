use thiserror::Error;

use crate::document::InvalidObjectId;
use crate::repository::RepositoryError;

/// Failures of the credential and telemetry stores. Infrastructure failures
/// stay wrapped in [`RepositoryError`] so callers can tell them apart.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("no matching record found")]
    NotFound,
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("no items in provided list")]
    EmptyBatch,
    #[error("the start date must be before the end date")]
    InvalidRange,
    #[error("stored role is not recognized: {0}")]
    UnrecognizedRole(String),
    #[error("{0} must be a finite number")]
    NonFiniteValue(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<InvalidObjectId> for StoreError {
    fn from(err: InvalidObjectId) -> Self {
        StoreError::InvalidIdentifier(err.0)
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
