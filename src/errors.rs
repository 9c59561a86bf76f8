// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML task definition: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("API request failed with status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Unexpected response structure: {0}")]
    UnexpectedResponse(String),

    #[error("Received empty text response from model")]
    EmptyResponse,

    #[error("Model '{model}' failed: {source}")]
    ModelFailure {
        model: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("Judge model '{model}' failed: {source}")]
    JudgeFailure {
        model: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider '{0}' is not configured")]
    ProviderNotFound(String),

    #[error("Invalid score schema: {0}")]
    InvalidScoreSchema(String),

    #[error("Score validation failed: {0}")]
    ScoreValidation(String),

    #[error("Could not parse judge scores: {0}")]
    ScoreParse(String),
}

impl EvalError {
    /// Errors that indicate bad caller input rather than a runtime fault.
    /// The HTTP layer maps these to 400 responses.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EvalError::Config(_)
                | EvalError::ProviderNotFound(_)
                | EvalError::InvalidScoreSchema(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
