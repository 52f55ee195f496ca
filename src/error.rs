use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Typed deserialization failure with the JSON path of the offending node.
    #[error("at JSON path {path} → {message}")]
    Deserialize { path: String, message: String },

    #[error("expected a JSON object at the document root")]
    NotAnObject,

    #[error("unknown visual type `{0}`")]
    UnknownVisual(String),

    #[error("visual `{visual}` has no variant `{variant}`")]
    UnknownVariant { visual: String, variant: String },
}
