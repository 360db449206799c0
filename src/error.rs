use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("improperly configured: {0}")]
    Config(String),

    #[error(
        "index class {class}.fields cannot be a string. \
         Did you mean to type: [\"{value}\"]?"
    )]
    FieldsIsString { class: String, value: String },

    #[error("index {index} has no field '{field}'")]
    UnknownField { index: String, field: String },

    #[error("invalid value {value:?} for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("index {0} is not linked to a model and has no primary key")]
    NoPrimaryKey(String),

    #[error("index does not exist: {0}")]
    IndexMissing(PathBuf),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("index lock poisoned by a panicking writer")]
    LockPoisoned,
}
