//! Error classification and retry policy for model invocation.
//!
//! Classification table, first match wins:
//!
//! | signal                              | category     | retryable | max retries |
//! |-------------------------------------|--------------|-----------|-------------|
//! | network change / connection reset   | `network`    | yes       | 3           |
//! | HTTP 5xx / "internal server error"  | `server`     | yes       | 1           |
//! | HTTP 401 / "unauthorized"           | `auth`       | no        | 0           |
//! | HTTP 429 / "too many requests"      | `rate_limit` | no        | 0           |
//! | anything else                       | `unknown`    | no        | 0           |

use super::chat::ModelError;
use crate::error::{Result, SrsError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

const BASE_DELAY_MS: u64 = 1000;

const NETWORK_SIGNALS: &[&str] = &[
    "err_network_changed",
    "network_changed",
    "network changed",
    "err_connection_reset",
    "econnreset",
    "connection reset",
];

static HTTP_5XX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:http|status|code)\D{0,3}5\d{2}\b")
        .expect("5xx status pattern must compile")
});

/// Retry category of a model invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Server,
    Auth,
    RateLimit,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Server => "server",
            ErrorCategory::Auth => "auth",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failure should be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub retryable: bool,
    pub max_retries: u32,
    pub category: ErrorCategory,
    pub user_message: String,
}

/// Maps a raw model error to a [`Classification`].
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ModelError) -> Classification;
}

/// Default classifier implementing the table in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkErrorClassifier;

impl NetworkErrorClassifier {
    fn signals(error: &ModelError) -> String {
        let mut text = error.message.to_lowercase();
        if let Some(code) = &error.code {
            text.push(' ');
            text.push_str(&code.to_lowercase());
        }
        text
    }
}

impl ErrorClassifier for NetworkErrorClassifier {
    fn classify(&self, error: &ModelError) -> Classification {
        let text = Self::signals(error);
        let status = error.status;
        let code_is = |value: &str| {
            error
                .code
                .as_deref()
                .is_some_and(|code| code.trim() == value)
        };

        if NETWORK_SIGNALS.iter().any(|signal| text.contains(signal)) {
            return Classification {
                retryable: true,
                max_retries: 3,
                category: ErrorCategory::Network,
                user_message: "network connectivity issue, retrying".to_string(),
            };
        }

        let is_5xx_code = error
            .code
            .as_deref()
            .and_then(|code| code.trim().parse::<u16>().ok())
            .is_some_and(|code| (500..600).contains(&code));
        if status.is_some_and(|s| (500..600).contains(&s))
            || is_5xx_code
            || text.contains("internal server error")
            || HTTP_5XX.is_match(&text)
        {
            return Classification {
                retryable: true,
                max_retries: 1,
                category: ErrorCategory::Server,
                user_message: "temporary server error, retrying".to_string(),
            };
        }

        if status == Some(401) || code_is("401") || text.contains("unauthorized") {
            return Classification {
                retryable: false,
                max_retries: 0,
                category: ErrorCategory::Auth,
                user_message: "authentication failed, check credentials".to_string(),
            };
        }

        if status == Some(429) || code_is("429") || text.contains("too many requests") {
            return Classification {
                retryable: false,
                max_retries: 0,
                category: ErrorCategory::RateLimit,
                user_message: "rate limited, try again later".to_string(),
            };
        }

        Classification {
            retryable: false,
            max_retries: 0,
            category: ErrorCategory::Unknown,
            user_message: error.message.clone(),
        }
    }
}

/// Delay before retry attempt `attempt` (1-indexed): 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    Duration::from_millis(BASE_DELAY_MS * (1u64 << exponent))
}

/// Runs `invoke`, retrying transient failures with exponential backoff.
///
/// Non-retryable failures are returned immediately as
/// `SrsError::ModelRejected` carrying the category's user message. Retryable
/// failures are retried up to the category's `max_retries`; once exhausted the
/// result is `SrsError::ModelRetriesExhausted`, whose message embeds the
/// category, the number of attempts and the original error text.
pub async fn with_retry<R, F, Fut>(mut invoke: F, classifier: &dyn ErrorClassifier) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<R, ModelError>>,
{
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let error = match invoke().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let classification = classifier.classify(&error);
        if !classification.retryable {
            tracing::warn!(
                category = %classification.category,
                "[Retry] Non-retryable model error: {}",
                error
            );
            return Err(SrsError::ModelRejected {
                category: classification.category.to_string(),
                user_message: classification.user_message,
                original: error.message,
            });
        }

        let retries_so_far = attempts - 1;
        if retries_so_far >= classification.max_retries {
            tracing::error!(
                category = %classification.category,
                attempts,
                "[Retry] Retries exhausted: {}",
                error
            );
            return Err(SrsError::ModelRetriesExhausted {
                category: classification.category.to_string(),
                attempts,
                message: error.message,
            });
        }

        let retry = retries_so_far + 1;
        let delay = backoff_delay(retry);
        tracing::warn!(
            "[Retry] {} error ({}), retry {}/{} in {}ms: {}",
            classification.category,
            classification.user_message,
            retry,
            classification.max_retries,
            delay.as_millis(),
            error
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn classify(error: ModelError) -> Classification {
        NetworkErrorClassifier.classify(&error)
    }

    #[test]
    fn test_backoff_is_deterministic() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_classification_table() {
        let network = classify(ModelError::new("net::ERR_NETWORK_CHANGED"));
        assert!(network.retryable);
        assert_eq!(network.max_retries, 3);
        assert_eq!(network.category, ErrorCategory::Network);

        let reset = classify(ModelError::new("socket closed").with_code("ECONNRESET"));
        assert_eq!(reset.category, ErrorCategory::Network);

        let server = classify(ModelError::new("upstream failed").with_status(503));
        assert_eq!(server.category, ErrorCategory::Server);
        assert_eq!(server.max_retries, 1);
        assert_eq!(
            classify(ModelError::new("500 Internal Server Error")).category,
            ErrorCategory::Server
        );
        assert_eq!(
            classify(ModelError::new("request failed").with_code("502")).category,
            ErrorCategory::Server
        );

        let auth = classify(ModelError::new("Unauthorized"));
        assert_eq!(auth.category, ErrorCategory::Auth);
        assert!(!auth.retryable);
        assert_eq!(auth.user_message, "authentication failed, check credentials");

        let rate = classify(ModelError::new("slow down").with_status(429));
        assert_eq!(rate.category, ErrorCategory::RateLimit);
        assert_eq!(rate.max_retries, 0);

        let unknown = classify(ModelError::new("model refused the prompt"));
        assert_eq!(unknown.category, ErrorCategory::Unknown);
        assert_eq!(unknown.user_message, "model refused the prompt");
    }

    #[test]
    fn test_network_checked_before_server() {
        let error = ModelError::new("connection reset").with_status(502);
        assert_eq!(classify(error).category, ErrorCategory::Network);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= 3 {
                        Err(ModelError::new("net::ERR_NETWORK_CHANGED"))
                    } else {
                        Ok("done")
                    }
                }
            },
            &NetworkErrorClassifier,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_retries_exhaust_with_composed_message() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<()> = with_retry(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ModelError::new("net::ERR_NETWORK_CHANGED"))
                }
            },
            &NetworkErrorClassifier,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            err.to_string(),
            "network error after 4 attempt(s): net::ERR_NETWORK_CHANGED"
        );
        // 1s + 2s + 4s of backoff
        assert!(started.elapsed() >= Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = with_retry(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ModelError::new("Internal Server Error").with_status(500))
                }
            },
            &NetworkErrorClassifier,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().to_string().starts_with("server error after 2"));
    }

    #[tokio::test]
    async fn test_non_retryable_called_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = with_retry(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ModelError::new("Too Many Requests").with_status(429))
                }
            },
            &NetworkErrorClassifier,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "rate limited, try again later");
        assert_eq!(err.model_category(), Some("rate_limit"));
    }
}
