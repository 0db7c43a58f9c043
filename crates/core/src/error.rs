#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
    #[error("submission not found: {0}")]
    SubmissionNotFound(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize: {0}")]
    Deserialization(serde_json::Error),

    #[error("reference data error: {0}")]
    ReferenceData(#[from] reference_data::ReferenceDataError),
    #[error("invalid text: {0}")]
    Text(#[from] stack_types::TextError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("generative backend request failed: {0}")]
    BackendRequest(reqwest::Error),
    #[error("generative backend returned HTTP {status}: {body}")]
    BackendStatus { status: u16, body: String },
    #[error("generative backend returned an unusable response: {0}")]
    BackendResponse(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database connection lock was poisoned")]
    StoreLockPoisoned,
    #[error("invalid stored value in column {column}: {value}")]
    InvalidStoredValue { column: &'static str, value: String },
}

pub type StackResult<T> = std::result::Result<T, StackError>;
