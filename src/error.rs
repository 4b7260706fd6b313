// src/error.rs
use thiserror::Error;

/// Anything that can go wrong between receiving a prompt and handing back text.
///
/// The `Display` output is shown to the caller verbatim inside the apology
/// reply, so messages stay short and free of internal paths where possible.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error("model hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("generator returned no candidate sequence")]
    NoCandidate,

    #[error("generation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value:?}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} is not a valid boolean: {value:?}")]
    InvalidBool { var: &'static str, value: String },
}
