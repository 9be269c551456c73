use thiserror::Error;

use manos_notes_core::CommandError;

/// Failure of one of the backend collaborators (chart, link metadata, upload).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("no figure for chart `{chart_id}`: {last}")]
    Exhausted { chart_id: String, last: Box<FetchError> },
}

impl From<serde_json::Error> for FetchError {
    fn from(value: serde_json::Error) -> Self {
        FetchError::Decode(value.to_string())
    }
}

impl From<http::Error> for FetchError {
    fn from(value: http::Error) -> Self {
        FetchError::Request(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload of `{name}` failed: {source}")]
    Upload {
        name: String,
        #[source]
        source: FetchError,
    },
    #[error("could not insert the uploaded image: {0}")]
    Insert(#[from] CommandError),
    #[error("the note changed before `{0}` finished uploading")]
    Stale(String),
}
