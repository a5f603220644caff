use crate::storage::StorageError;
use thiserror::Error;

/// Problems detected while building a [`Recorder`](super::Recorder).
/// A recorder that failed with one of these must not be used.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing database table `{0}`; run the visits migration first")]
    MissingTable(String),
    #[error("no tracking method configured")]
    NoTrackingMethod,
    #[error("unknown tracking method `{0}` (expected ip_address, session_id or user_id)")]
    UnknownTrackingMethod(String),
    #[error("invalid reset minutes `{0}`; expected a non-negative integer")]
    InvalidResetMinutes(String),
    #[error("invalid exclude pattern `{pattern}`: {source}")]
    InvalidExcludePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown transformer `{0}`")]
    UnknownTransformer(String),
}

#[derive(Debug, Error)]
pub enum VisitsError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type VisitsResult<T> = Result<T, VisitsError>;
