use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Stage timed out: {0}")]
    Timeout(String),

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
