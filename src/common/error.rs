use rust_tokenizers::error::TokenizerError;
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("Unsupported model error: {0}")]
    UnsupportedModel(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Data error: {0}")]
    DataError(String),
}

impl From<std::io::Error> for SummarizationError {
    fn from(error: std::io::Error) -> Self {
        SummarizationError::IOError(error.to_string())
    }
}

impl From<TokenizerError> for SummarizationError {
    fn from(error: TokenizerError) -> Self {
        SummarizationError::TokenizerError(error.to_string())
    }
}

impl From<TchError> for SummarizationError {
    fn from(error: TchError) -> Self {
        SummarizationError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for SummarizationError {
    fn from(error: serde_json::Error) -> Self {
        SummarizationError::SerializationError(error.to_string())
    }
}

impl From<csv::Error> for SummarizationError {
    fn from(error: csv::Error) -> Self {
        SummarizationError::SerializationError(error.to_string())
    }
}
