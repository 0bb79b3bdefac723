use std::time::Duration;
use tokio::time::sleep;

use super::api::{RawQuestion, TriviaTransport};
use super::error::{FetchError, Result as FetchResult};
use super::question::QuestionRecord;
use crate::config::RetryConfig;

/// Bounded exponential backoff for rate-limited fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_count + 1`: `base * 2^retry_count`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(retry_count))
    }

    /// Fetches one batch of questions, retrying serially while the API keeps
    /// rate limiting. Any other failure is returned immediately. When retries
    /// run out the rate limit escalates to an HTTP 429 error.
    #[tracing::instrument(skip(self, transport), fields(
        retry.max = self.max_retries,
        retry.base_delay_ms = self.base_delay.as_millis() as u64
    ))]
    pub async fn fetch_questions<T: TriviaTransport>(
        &self,
        transport: &T,
        amount: u8,
    ) -> FetchResult<Vec<QuestionRecord>> {
        let mut retry_count = 0u32;

        loop {
            let attempt = transport
                .fetch_batch(amount)
                .await
                .and_then(|response| response.into_results(amount as usize));

            match attempt {
                Ok(raw_questions) => {
                    tracing::info!(
                        retry.count = retry_count,
                        questions.count = raw_questions.len(),
                        "Fetched trivia questions"
                    );
                    return Ok(build_records(raw_questions));
                }
                Err(e) if e.is_rate_limited() && retry_count < self.max_retries => {
                    let delay = self.delay_for(retry_count);
                    tracing::warn!(
                        retry.count = retry_count + 1,
                        retry.delay_ms = delay.as_millis() as u64,
                        "Rate limited by trivia API. Backing off"
                    );
                    sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) if e.is_rate_limited() => {
                    tracing::error!(
                        retry.count = retry_count,
                        "Still rate limited after exhausting retries"
                    );
                    return Err(FetchError::Http { status: 429 });
                }
                Err(e) => {
                    tracing::error!(error = %e, retry.count = retry_count, "Trivia fetch failed");
                    return Err(e);
                }
            }
        }
    }
}

fn build_records(raw_questions: Vec<RawQuestion>) -> Vec<QuestionRecord> {
    let mut rng = rand::thread_rng();
    raw_questions
        .into_iter()
        .map(|raw| QuestionRecord::from_raw(raw, &mut rng))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::trivia::api::TriviaResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Scripted outcome for one request.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Step {
        Ok,
        RateLimited,
        Status(u16),
    }

    /// Transport double that replays a script, then keeps succeeding.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        request_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(steps: &[Step]) -> Self {
            Self {
                script: Mutex::new(steps.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                request_times: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn request_times(&self) -> Vec<Instant> {
            self.request_times.lock().unwrap().clone()
        }
    }

    pub(crate) fn sample_response(amount: u8) -> TriviaResponse {
        let results = (0..amount)
            .map(|i| RawQuestion {
                category: Some("General Knowledge".to_string()),
                difficulty: Some("easy".to_string()),
                question: format!("Question {}", i + 1),
                correct_answer: format!("Right {}", i + 1),
                incorrect_answers: vec![
                    format!("Wrong {}a", i + 1),
                    format!("Wrong {}b", i + 1),
                    format!("Wrong {}c", i + 1),
                ],
            })
            .collect();
        TriviaResponse {
            response_code: 0,
            results,
        }
    }

    impl TriviaTransport for ScriptedTransport {
        async fn fetch_batch(&self, amount: u8) -> FetchResult<TriviaResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.request_times.lock().unwrap().push(Instant::now());
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(sample_response(amount)),
                Step::RateLimited => Err(FetchError::RateLimited),
                Step::Status(status) => Err(FetchError::Http { status }),
            }
        }
    }

    #[test]
    fn backoff_sequence_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..5).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(200),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_returns_five_records() {
        let transport = ScriptedTransport::new(&[]);
        let records = RetryPolicy::default()
            .fetch_questions(&transport, 5)
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(transport.calls(), 1);
        for record in &records {
            assert_eq!(record.all_answers().len(), 4);
            assert!(record.selected().is_none());
            assert_eq!(
                record
                    .all_answers()
                    .iter()
                    .filter(|a| a.as_str() == record.correct_answer())
                    .count(),
                1
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_three_rate_limits() {
        let transport = ScriptedTransport::new(&[
            Step::RateLimited,
            Step::RateLimited,
            Step::RateLimited,
            Step::Ok,
        ]);
        let started = Instant::now();

        let records = RetryPolicy::default()
            .fetch_questions(&transport, 5)
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(transport.calls(), 4);
        assert!(started.elapsed() >= Duration::from_millis(1000 + 2000 + 4000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_spaced_by_exponential_backoff() {
        let transport = ScriptedTransport::new(&[Step::RateLimited; 5]);
        RetryPolicy::default()
            .fetch_questions(&transport, 5)
            .await
            .unwrap();

        let times = transport.request_times();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
                Duration::from_millis(16000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_rate_limit_is_terminal() {
        let transport = ScriptedTransport::new(&[Step::RateLimited; 6]);

        let err = RetryPolicy::default()
            .fetch_questions(&transport, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Http { status: 429 }));
        assert_eq!(err.to_string(), "Error: 429");
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn other_statuses_fail_without_retry() {
        let transport = ScriptedTransport::new(&[Step::Status(503), Step::Ok]);
        let started = Instant::now();

        let err = RetryPolicy::default()
            .fetch_questions(&transport, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Http { status: 503 }));
        assert_eq!(transport.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_policy_fails_on_first_rate_limit() {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1000),
        };
        let transport = ScriptedTransport::new(&[Step::RateLimited]);

        let err = policy.fetch_questions(&transport, 5).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 429 }));
        assert_eq!(transport.calls(), 1);
    }
}
