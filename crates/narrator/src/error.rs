use thiserror::Error;

pub type Result<T> = std::result::Result<T, NarratorError>;

#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("request rejected: unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("the model returned no text")]
    EmptyResponse,
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
