use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AuxiliumConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
    /// Public base URL of this backend, used to build URLs for locally
    /// stored media (e.g. "http://192.168.1.5:8002").
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Supabase project URL (e.g. "https://xyz.supabase.co").
    pub supabase_url: String,
    /// Service-role key. Empty disables the remote backend and the
    /// fallback strategy goes straight to local disk.
    #[serde(default)]
    pub supabase_service_key: String,
    pub bucket: String,
    /// Directory for the local-disk fallback, served at /uploads.
    pub local_dir: String,
    /// Photo URL substituted when the remote upload degrades to local disk.
    pub placeholder_photo_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible base URL (".../v1").
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub language: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Base URL of the remote classification service (ngrok tunnel to Colab
    /// in the original deployment).
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means permissive (dev default, the mobile
    /// app connects from Expo dev URLs).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            cors_origins: Vec::new(),
        }
    }
}

impl AuxiliumConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            // AUXILIUM__DATABASE__URL=... overrides [database].url
            .add_source(Environment::with_prefix("AUXILIUM").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
