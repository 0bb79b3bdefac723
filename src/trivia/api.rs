use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use super::error::{FetchError, Result as FetchResult};
use crate::config::TriviaApiConfig;

// Body-level code the API uses when a client asks too often.
const RESPONSE_CODE_RATE_LIMIT: u8 = 5;

/// One entry of the `results` array, exactly as the API sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriviaResponse {
    #[serde(default)]
    pub response_code: u8,
    pub results: Vec<RawQuestion>,
}

impl TriviaResponse {
    /// Maps the body-level response code onto the fetch error model.
    pub fn into_results(self, expected: usize) -> FetchResult<Vec<RawQuestion>> {
        match self.response_code {
            0 => {}
            RESPONSE_CODE_RATE_LIMIT => return Err(FetchError::RateLimited),
            code => return Err(FetchError::Api { code }),
        }
        if self.results.len() < expected {
            return Err(FetchError::Incomplete {
                expected,
                received: self.results.len(),
            });
        }
        let mut results = self.results;
        results.truncate(expected);
        Ok(results)
    }
}

/// A single request for a batch of questions. Retrying is the caller's job.
pub trait TriviaTransport: Send + Sync {
    fn fetch_batch(&self, amount: u8) -> impl Future<Output = FetchResult<TriviaResponse>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &TriviaApiConfig) -> FetchResult<Self> {
        Self::with_timeout(config.base_url.clone(), config.request_timeout())
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl TriviaTransport for HttpTransport {
    #[tracing::instrument(skip(self), fields(http.url = %self.base_url))]
    async fn fetch_batch(&self, amount: u8) -> FetchResult<TriviaResponse> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("amount", amount)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // The retry policy owns rate-limit reporting
            tracing::debug!(http.status = status.as_u16(), "Trivia API rate limited the request");
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            tracing::debug!(http.status = status.as_u16(), "Trivia API request failed");
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: TriviaResponse = serde_json::from_slice(&body)?;
        tracing::debug!(
            response.code = parsed.response_code,
            results.count = parsed.results.len(),
            "Trivia API responded"
        );
        Ok(parsed)
    }
}
