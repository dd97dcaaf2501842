//! Retry Engine
//!
//! Exponential backoff with transient/permanent classification. Only
//! operations wrapped here retry; permanent errors fail fast after a single
//! attempt, and unknown errors are treated as non-retryable.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::warn;

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// What the classifier decided about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Retry with backoff
    Transient,
    /// Fail fast, one attempt only
    Permanent,
    /// No signal either way; treated as non-retryable
    Unknown,
}

/// The minimal view of an error the classifier needs
#[derive(Debug, Clone, Default)]
pub struct ErrorSignal {
    /// HTTP status, when the error came from an HTTP call
    pub http_status: Option<u16>,
    /// Platform-style error code (ETIMEDOUT, ECONNREFUSED, ...)
    pub error_code: Option<String>,
    /// Error message
    pub message: String,
}

impl ErrorSignal {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Errors that can be classified for retry
pub trait RetrySignal {
    fn signal(&self) -> ErrorSignal;
}

impl RetrySignal for ErrorSignal {
    fn signal(&self) -> ErrorSignal {
        self.clone()
    }
}

impl RetrySignal for crate::errors::MemoryError {
    fn signal(&self) -> ErrorSignal {
        ErrorSignal {
            http_status: None,
            error_code: Some(self.code.as_str().to_string()),
            message: self.message.clone(),
        }
    }
}

const TRANSIENT_HTTP: &[u16] = &[408, 429, 500, 502, 503, 504, 520, 521, 522, 523, 524];
const PERMANENT_HTTP: &[u16] = &[400, 401, 403, 404];

const TRANSIENT_CODES: &[&str] = &[
    "ETIMEDOUT",
    "ECONNRESET",
    "ECONNREFUSED",
    "ENOTFOUND",
    "ENETUNREACH",
    "EHOSTUNREACH",
];

/// Classify an error signal; returns the class and the reason that decided it
pub fn classify_error(signal: &ErrorSignal) -> (ErrorClass, String) {
    if let Some(status) = signal.http_status {
        if TRANSIENT_HTTP.contains(&status) {
            return (ErrorClass::Transient, format!("http_status_{status}"));
        }
        if PERMANENT_HTTP.contains(&status) {
            return (ErrorClass::Permanent, format!("http_status_{status}"));
        }
    }

    if let Some(code) = signal.error_code.as_deref() {
        let upper = code.to_uppercase();
        if TRANSIENT_CODES.contains(&upper.as_str()) {
            return (ErrorClass::Transient, format!("error_code_{upper}"));
        }
    }

    let lower = signal.message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("timeout") {
        return (ErrorClass::Transient, "message_match".to_string());
    }
    if lower.contains("busy") || lower.contains("locked") {
        return (ErrorClass::Transient, "sqlite_contention".to_string());
    }
    if lower.contains("api key") || lower.contains("authentication") || lower.contains("forbidden")
    {
        return (ErrorClass::Permanent, "message_match".to_string());
    }

    (ErrorClass::Unknown, "no_signal".to_string())
}

// ============================================================================
// BACKOFF
// ============================================================================

/// `min(base * exp^attempt, max)` in milliseconds.
///
/// The defaults (base 1000, exp 2) give the sequence 1000, 2000, 4000.
pub fn calculate_backoff(attempt: u32, base_ms: u64, exponential_base: f64, max_ms: u64) -> u64 {
    let raw = (base_ms as f64) * exponential_base.powi(attempt as i32);
    (raw as u64).min(max_ms)
}

// ============================================================================
// OPTIONS AND RESULTS
// ============================================================================

type OnRetry = Box<dyn Fn(u32, &ErrorSignal, u64) + Send + Sync>;

/// Options for `retry_with_backoff`
pub struct RetryOptions {
    /// Name used in logs and attempt records
    pub operation_name: String,
    /// Retries on top of the one initial attempt
    pub max_retries: u32,
    /// First backoff delay
    pub base_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
    /// Exponential growth factor
    pub exponential_base: f64,
    /// Invoked before each retry sleep with (attempt, error, delay_ms)
    pub on_retry: Option<OnRetry>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            operation_name: "operation".to_string(),
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: u64::MAX,
            exponential_base: 2.0,
            on_retry: None,
        }
    }
}

impl RetryOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            operation_name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_on_retry(
        mut self,
        hook: impl Fn(u32, &ErrorSignal, u64) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }
}

/// One row of the attempt log
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// What the classifier decided
    pub error_type: ErrorClass,
    /// Why it decided that
    pub classification_reason: String,
    /// Delay slept before the next attempt, if any
    pub delay_ms: Option<u64>,
}

/// Terminal retry failure, wrapping the last underlying error
#[derive(Debug)]
pub struct RetryError<E> {
    /// The last error observed
    pub error: E,
    /// All retries were consumed by transient failures
    pub retries_exhausted: bool,
    /// The first attempt failed permanently
    pub is_permanent: bool,
    /// One record per failed attempt
    pub attempt_log: Vec<AttemptRecord>,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_permanent {
            write!(f, "permanent failure (no retry): {}", self.error)
        } else if self.retries_exhausted {
            write!(
                f,
                "retries exhausted after {} attempts: {}",
                self.attempt_log.len(),
                self.error
            )
        } else {
            write!(f, "non-retryable failure: {}", self.error)
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for RetryError<E> {}

// ============================================================================
// RETRY LOOP
// ============================================================================

/// Run `operation`, retrying transient failures with exponential backoff.
///
/// With `max_retries = n` and persistent transient failure the operation is
/// called exactly `n + 1` times. The backoff delay blocks only this task.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: F,
    opts: RetryOptions,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetrySignal,
{
    let mut attempt_log = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let signal = err.signal();
                let (class, reason) = classify_error(&signal);

                match class {
                    ErrorClass::Permanent => {
                        attempt_log.push(AttemptRecord {
                            attempt,
                            error_type: class,
                            classification_reason: reason,
                            delay_ms: None,
                        });
                        return Err(RetryError {
                            error: err,
                            retries_exhausted: false,
                            is_permanent: true,
                            attempt_log,
                        });
                    }
                    ErrorClass::Unknown => {
                        attempt_log.push(AttemptRecord {
                            attempt,
                            error_type: class,
                            classification_reason: reason,
                            delay_ms: None,
                        });
                        return Err(RetryError {
                            error: err,
                            retries_exhausted: false,
                            is_permanent: false,
                            attempt_log,
                        });
                    }
                    ErrorClass::Transient => {
                        if attempt > opts.max_retries {
                            attempt_log.push(AttemptRecord {
                                attempt,
                                error_type: class,
                                classification_reason: reason,
                                delay_ms: None,
                            });
                            return Err(RetryError {
                                error: err,
                                retries_exhausted: true,
                                is_permanent: false,
                                attempt_log,
                            });
                        }

                        let delay = calculate_backoff(
                            attempt - 1,
                            opts.base_delay_ms,
                            opts.exponential_base,
                            opts.max_delay_ms,
                        );
                        attempt_log.push(AttemptRecord {
                            attempt,
                            error_type: class,
                            classification_reason: reason,
                            delay_ms: Some(delay),
                        });

                        warn!(
                            operation = %opts.operation_name,
                            attempt,
                            max = opts.max_retries,
                            delay_ms = delay,
                            "transient failure, retrying"
                        );

                        if let Some(hook) = &opts.on_retry {
                            hook(attempt, &signal, delay);
                        }

                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
