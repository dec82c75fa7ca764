use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuxiliumError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] crate::transcription::TranscriptionError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] crate::classifier::ClassifierError),

    #[error("Other error: {0}")]
    Other(String),
}
