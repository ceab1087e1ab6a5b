//! Settle-all aggregation for multi-call views.
//!
//! All calls run concurrently and every one is awaited, whatever the others
//! do. The caller inspects the settled results afterwards: partial data is
//! still usable, and only a batch where everything failed is an error.

use crate::error::{ApiError, ApiResult};
use futures::future::join_all;
use std::future::Future;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AggregateError {
    /// Every call in the batch failed. `first` is the most relevant cause,
    /// preferring an expired session over other failures.
    #[error("All {failed} calls failed: {first}")]
    AllFailed {
        failed: usize,
        #[source]
        first: ApiError,
    },
}

impl AggregateError {
    pub fn requires_login(&self) -> bool {
        match self {
            AggregateError::AllFailed { first, .. } => first.requires_login(),
        }
    }
}

/// Results of a batch, in submission order.
#[derive(Debug)]
pub struct Settled<T> {
    results: Vec<ApiResult<T>>,
}

impl<T> Settled<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    /// True for a non-empty batch in which no call succeeded.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.failed_count() == self.results.len()
    }

    /// True when at least one call failed, whether or not others succeeded.
    pub fn is_degraded(&self) -> bool {
        self.failed_count() > 0
    }

    pub fn results(&self) -> &[ApiResult<T>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ApiResult<T>> {
        self.results
    }

    /// Successful values in order, `None` for each failed slot.
    ///
    /// Fails only when the whole batch failed.
    pub fn into_values_or_error(self) -> Result<Vec<Option<T>>, AggregateError> {
        if !self.all_failed() {
            return Ok(self.results.into_iter().map(Result::ok).collect());
        }

        let failed = self.results.len();
        let mut first = None;
        for error in self.results.into_iter().filter_map(Result::err) {
            if error.requires_login() {
                first = Some(error);
                break;
            }
            first.get_or_insert(error);
        }

        match first {
            Some(first) => Err(AggregateError::AllFailed { failed, first }),
            // all_failed() guarantees at least one error
            None => Ok(Vec::new()),
        }
    }
}

/// Drive every future to completion and collect the outcomes in order.
///
/// Failures are logged and kept; they never cancel sibling calls.
pub async fn settle_all<T, F>(calls: impl IntoIterator<Item = F>) -> Settled<T>
where
    F: Future<Output = ApiResult<T>>,
{
    let results = join_all(calls).await;

    for (index, result) in results.iter().enumerate() {
        if let Err(e) = result {
            warn!(index, kind = ?e.kind(), error = %e, "Call in batch failed");
        }
    }

    Settled { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvalidationReason;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    fn ok(value: u32) -> BoxFuture<'static, ApiResult<u32>> {
        async move { Ok(value) }.boxed()
    }

    fn remote(status: u16) -> BoxFuture<'static, ApiResult<u32>> {
        async move { Err(ApiError::remote_status(status, "failed")) }.boxed()
    }

    fn expired() -> BoxFuture<'static, ApiResult<u32>> {
        async move {
            Err(ApiError::AuthExpired {
                reason: InvalidationReason::Unauthorized,
                source: None,
            })
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let settled = settle_all(vec![ok(1), remote(500), ok(3)]).await;

        assert_eq!(settled.len(), 3);
        assert_eq!(settled.failed_count(), 1);
        assert!(settled.is_degraded());
        assert!(!settled.all_failed());
        assert_eq!(
            settled.into_values_or_error().unwrap(),
            vec![Some(1), None, Some(3)]
        );
    }

    #[tokio::test]
    async fn test_all_failed_prefers_auth_expired() {
        let settled = settle_all(vec![remote(500), expired(), remote(404)]).await;
        assert!(settled.all_failed());

        let err = settled.into_values_or_error().unwrap_err();
        assert!(err.requires_login());
        match err {
            AggregateError::AllFailed { failed, first } => {
                assert_eq!(failed, 3);
                assert_eq!(first.status(), Some(401));
            }
        }
    }

    #[tokio::test]
    async fn test_all_failed_without_auth_uses_first_error() {
        let err = settle_all(vec![remote(502), remote(404)])
            .await
            .into_values_or_error()
            .unwrap_err();

        assert!(!err.requires_login());
        let AggregateError::AllFailed { first, .. } = err;
        assert_eq!(first.status(), Some(502));
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let finished = Arc::new(AtomicUsize::new(0));
        let slow = |done: Arc<AtomicUsize>| {
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ApiError>(7)
            }
            .boxed()
        };

        let settled = settle_all(vec![
            remote(500),
            slow(finished.clone()),
            slow(finished.clone()),
        ])
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(settled.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_a_failure() {
        let settled = settle_all(Vec::<BoxFuture<'static, ApiResult<u32>>>::new()).await;
        assert!(settled.is_empty());
        assert!(!settled.all_failed());
        assert!(settled.into_values_or_error().unwrap().is_empty());
    }
}
