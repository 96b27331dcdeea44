//! Retry policies for calls to a pricing endpoint.
//!
//! A policy only decides: given the error of a failed attempt, wait and try again or
//! give up. [`execute`] runs the attempts, the cancellable waits and the retry hook.

use crate::error::{Result, UploadError};
use log::debug;
use pricing::EndpointError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Selects the errors a policy handles.
pub type ErrorFilter = Arc<dyn Fn(&EndpointError) -> bool + Send + Sync>;

pub trait RetryPolicy: Send {
    /// Called after a failed attempt.
    ///
    /// # Returns
    ///
    /// * `Option<Duration>` - How long to wait before the next attempt, or `None` to give up.
    fn on_failure(&mut self, error: &EndpointError) -> Option<Duration>;

    /// Forgets the attempts counted so far.
    fn reset(&mut self);
}

/// Retries handled errors up to `max_retries` times.
pub struct BoundedRetry {
    max_retries: u32,
    delay: Duration,
    handles: ErrorFilter,
    retries: u32,
}

impl BoundedRetry {
    pub fn new(max_retries: u32, delay: Duration, handles: ErrorFilter) -> Self {
        Self {
            max_retries,
            delay,
            handles,
            retries: 0,
        }
    }
}

impl RetryPolicy for BoundedRetry {
    fn on_failure(&mut self, error: &EndpointError) -> Option<Duration> {
        if !(self.handles)(error) || self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.delay)
    }

    fn reset(&mut self) {
        self.retries = 0;
    }
}

/// Retries handled errors until they stop happening.
pub struct RetryForever {
    delay: Duration,
    handles: ErrorFilter,
}

impl RetryForever {
    pub fn new(delay: Duration, handles: ErrorFilter) -> Self {
        Self { delay, handles }
    }
}

impl RetryPolicy for RetryForever {
    fn on_failure(&mut self, error: &EndpointError) -> Option<Duration> {
        (self.handles)(error).then_some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Two policies protecting the same call.
///
/// The inner policy sees each error first. Errors it gives up on go to the outer
/// policy; when the outer one retries, the inner one starts counting afresh.
pub struct PolicyWrap<O, I> {
    outer: O,
    inner: I,
}

impl<O: RetryPolicy, I: RetryPolicy> PolicyWrap<O, I> {
    pub fn new(outer: O, inner: I) -> Self {
        Self { outer, inner }
    }
}

impl<O: RetryPolicy, I: RetryPolicy> RetryPolicy for PolicyWrap<O, I> {
    fn on_failure(&mut self, error: &EndpointError) -> Option<Duration> {
        if let Some(delay) = self.inner.on_failure(error) {
            return Some(delay);
        }
        let delay = self.outer.on_failure(error)?;
        self.inner.reset();
        Some(delay)
    }

    fn reset(&mut self) {
        self.outer.reset();
        self.inner.reset();
    }
}

/// Runs `operation` under `policy`.
///
/// Cancellation is checked before every attempt and interrupts the waits between
/// attempts. `on_retry` runs after each failed attempt that will be retried, before
/// the wait.
///
/// # Returns
///
/// * `Result<T>` - The first successful result, `UploadError::Endpoint` with the last
///   error once the policy gives up, or `UploadError::Cancelled`.
pub async fn execute<T, P, Op, Fut, Hook>(
    policy: &mut P,
    cancel: &CancellationToken,
    mut operation: Op,
    mut on_retry: Hook,
) -> Result<T>
where
    P: RetryPolicy + ?Sized,
    Op: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, EndpointError>>,
    Hook: FnMut(&EndpointError, Duration, u32),
{
    policy.reset();
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        attempt += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let Some(delay) = policy.on_failure(&error) else {
            debug!("Giving up after {} attempt(s): {}", attempt, error);
            return Err(UploadError::Endpoint(error));
        };
        on_retry(&error, delay, attempt);

        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Filter matching connectivity errors.
pub fn connectivity() -> ErrorFilter {
    Arc::new(EndpointError::is_connectivity)
}

/// Filter matching connectivity errors whose message contains one of `substrings`,
/// ignoring case.
pub fn connectivity_containing(substrings: &[String]) -> ErrorFilter {
    let substrings: Vec<String> = substrings.iter().map(|s| s.to_lowercase()).collect();
    Arc::new(move |error: &EndpointError| {
        error.is_connectivity() && message_contains_any(error.message(), &substrings)
    })
}

/// Filter matching everything but a schema mismatch.
pub fn all_but_schema_mismatch() -> ErrorFilter {
    Arc::new(|error: &EndpointError| !error.is_schema_mismatch())
}

/// Case-insensitive substring test; `lowercase_needles` must already be lowercase.
pub(crate) fn message_contains_any(message: &str, lowercase_needles: &[String]) -> bool {
    let message = message.to_lowercase();
    lowercase_needles.iter().any(|n| message.contains(n.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn connection_error() -> EndpointError {
        EndpointError::Connectivity("connection reset".into())
    }

    fn unavailable_error() -> EndpointError {
        EndpointError::Connectivity("The request failed with HTTP status 404: Not Found".into())
    }

    fn unavailable() -> ErrorFilter {
        connectivity_containing(&["the request failed with http status 404: not found".to_string()])
    }

    #[test]
    fn test_bounded_gives_up_after_max_retries() {
        let mut policy = BoundedRetry::new(2, Duration::from_secs(5), connectivity());
        assert_eq!(policy.on_failure(&connection_error()), Some(Duration::from_secs(5)));
        assert_eq!(policy.on_failure(&connection_error()), Some(Duration::from_secs(5)));
        assert_eq!(policy.on_failure(&connection_error()), None);

        policy.reset();
        assert!(policy.on_failure(&connection_error()).is_some());
        assert!(policy.on_failure(&EndpointError::Rejected("no".into())).is_none());
    }

    #[test]
    fn test_forever_never_gives_up_on_handled_errors() {
        let mut policy = RetryForever::new(Duration::from_secs(300), unavailable());
        for _ in 0..1000 {
            assert!(policy.on_failure(&unavailable_error()).is_some());
        }
        assert!(policy.on_failure(&connection_error()).is_none());
    }

    #[test]
    fn test_wrap_resets_inner_when_outer_retries() {
        let inner = BoundedRetry::new(1, Duration::from_millis(1), connectivity());
        let outer = BoundedRetry::new(1, Duration::from_millis(2), connectivity());
        let mut wrap = PolicyWrap::new(outer, inner);

        assert_eq!(wrap.on_failure(&connection_error()), Some(Duration::from_millis(1)));
        assert_eq!(wrap.on_failure(&connection_error()), Some(Duration::from_millis(2)));
        // inner was reset by the outer retry
        assert_eq!(wrap.on_failure(&connection_error()), Some(Duration::from_millis(1)));
        assert_eq!(wrap.on_failure(&connection_error()), None);
    }

    #[test]
    fn test_schema_mismatch_is_never_handled() {
        let filter = all_but_schema_mismatch();
        assert!(!filter(&EndpointError::SchemaMismatch("x".into())));
        assert!(filter(&connection_error()));
        assert!(filter(&EndpointError::Other("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_retries_until_success() {
        let calls = AtomicU32::new(0);
        let retries = AtomicU32::new(0);
        let mut policy = PolicyWrap::new(
            BoundedRetry::new(1, Duration::from_secs(5), connectivity()),
            RetryForever::new(Duration::from_secs(300), unavailable()),
        );
        let cancel = CancellationToken::new();

        let result = execute(
            &mut policy,
            &cancel,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0..=4 => Err(unavailable_error()),
                        5 => Err(connection_error()),
                        _ => Ok(n),
                    }
                }
            },
            |_, _, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 6);
        assert_eq!(retries.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_returns_last_error_when_exhausted() {
        let mut policy = BoundedRetry::new(2, Duration::from_secs(5), connectivity());
        let cancel = CancellationToken::new();

        let err = execute(
            &mut policy,
            &cancel,
            || async { Err::<(), _>(connection_error()) },
            |_, _, _| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::Endpoint(EndpointError::Connectivity(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_stops_waiting_on_cancel() {
        let mut policy = RetryForever::new(Duration::from_secs(300), connectivity());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = execute(
            &mut policy,
            &cancel,
            || async { Err::<(), _>(connection_error()) },
            |_, _, _| {},
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_message_matching_ignores_case() {
        let needles = vec!["after contract expiration".to_string()];
        assert!(message_contains_any(
            "Cannot upload option price AFTER CONTRACT EXPIRATION",
            &needles
        ));
        assert!(!message_contains_any("Unknown instrument", &needles));
    }
}
