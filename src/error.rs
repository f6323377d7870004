//! Error types for payload decoding and dataset lookup

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The bytes are not a JSON document at all.
    #[error("Malformed payload: {source}")]
    MalformedPayload {
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON, but not shaped like a stats response.
    #[error("Unexpected shape at `{path}`: {reason}")]
    UnexpectedShape {
        path: String,
        reason: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// No result set with this name. Callers usually read this as "no data".
    #[error("Dataset not found: {name}")]
    DatasetNotFound { name: String },

    #[error("Row index {index} out of range for dataset with {len} rows")]
    RowIndexOutOfRange { index: usize, len: usize },
}

impl Error {
    pub(crate) fn shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnexpectedShape {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// True for the recoverable "dataset absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DatasetNotFound { .. })
    }

    /// True for errors raised while turning bytes into an envelope.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::MalformedPayload { .. } | Error::UnexpectedShape { .. }
        )
    }
}
