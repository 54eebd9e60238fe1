// ⚠️ Error Taxonomy
// Library-level failures. Binaries wrap these with anyhow context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Unexpected shape or depth in the module hierarchy. Fatal for the subtree.
    #[error("structure error at '{node}': {reason}")]
    Structure { node: String, reason: String },

    /// A piece's image segment could not be split into front/back refs
    #[error("malformed image reference '{segment}' in '{node}'")]
    MalformedImageRef { node: String, segment: String },

    /// An image file could not be decoded. Callers skip the file.
    #[error("failed to decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The packaging templates have no object of this name
    #[error("missing object template '{0}'")]
    MissingTemplate(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn structure(node: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::Structure {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for ConvertError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ConvertError::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;
