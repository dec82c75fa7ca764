pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod storage;
pub mod transcription;

pub use classifier::{ClassifierError, ColabClassifier, EmergencyClassifier, Verdict};
pub use config::AuxiliumConfig;
pub use error::AuxiliumError;
pub use storage::{FallbackStorage, LocalStorage, MediaStorage, StorageError, SupabaseStorage};
pub use transcription::{Transcriber, TranscriptionError, WhisperTranscriber, TRANSCRIPT_UNAVAILABLE};
