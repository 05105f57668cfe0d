use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid rewrite spec: {0}")]
    InvalidRewriteSpec(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
