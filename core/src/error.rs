use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Parse failure: {0}")]
    Parse(String),

    #[error("Enumeration failure: {0}")]
    Enumeration(String),

    #[error("Protected volume: {0}")]
    ProtectedResource(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("All format strategies failed: {0}")]
    FormatExhausted(String),

    #[error("Letter assignment failed: {0}")]
    LetterAssignment(String),

    #[error("Drive letter in use: {0}")]
    LetterInUse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
