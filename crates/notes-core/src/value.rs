use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Document, Editor};

const DEFAULT_SCHEMA: &str = "manos-notes";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown markup schema `{0}`")]
    UnknownSchema(String),
    #[error("unsupported markup version {0}")]
    UnsupportedVersion(u32),
}

/// The serialized form of a note body handed to and from the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl NoteValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_markup(&self) -> Result<String, MarkupError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_markup_pretty(&self) -> Result<String, MarkupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        let value: NoteValue = serde_json::from_str(markup)?;
        if value.schema != DEFAULT_SCHEMA {
            return Err(MarkupError::UnknownSchema(value.schema));
        }
        if value.version > DEFAULT_VERSION {
            return Err(MarkupError::UnsupportedVersion(value.version));
        }
        Ok(value)
    }
}

impl Editor {
    pub fn to_markup(&self) -> Result<String, MarkupError> {
        NoteValue::from_document(self.doc().clone()).to_markup()
    }

    /// Replace the document with the one in `markup` (a note switch).
    ///
    /// On error the current document is kept.
    pub fn load_markup(&mut self, markup: &str) -> Result<(), MarkupError> {
        let value = NoteValue::from_markup(markup)?;
        self.replace_document(value.into_document());
        Ok(())
    }
}
