use thiserror::Error;

#[derive(Error, Debug)]
pub enum FiscalProfileError {
    #[error("Mapping configuration unavailable: {0}")]
    MissingMapping(String),

    #[error("Invalid mapping for group '{group}': {details}")]
    InvalidMapping { group: String, details: String },

    #[error("Column '{column}' is mapped to both '{first_bucket}' and '{second_bucket}' in group '{group}'")]
    DuplicateColumn {
        group: String,
        column: String,
        first_bucket: String,
        second_bucket: String,
    },

    #[error("Row {row} has no value for mapped column '{column}'")]
    MissingColumn { row: String, column: String },

    #[error("Column '{column}' has non-numeric value '{value}'")]
    InvalidValue { column: String, value: String },

    #[error("Missing identity field: {0}")]
    MissingIdentity(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Fund balance roll-forward violation for {row}: expected {expected}, got {actual} (difference {difference})")]
    RollForwardViolation {
        row: String,
        expected: f64,
        actual: f64,
        difference: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FiscalProfileError>;
