use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP 429, or the API's own rate-limit response code. Retried by the
    /// policy and never surfaced to the session unless retries run out.
    #[error("Rate limited by the trivia API")]
    RateLimited,
    #[error("Error: {status}")]
    Http { status: u16 },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Malformed trivia payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Trivia API returned response code {code}")]
    Api { code: u8 },
    #[error("Expected {expected} questions, received {received}")]
    Incomplete { expected: usize, received: usize },
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
