use crate::models::RetryPolicy;
use std::future::Future;

/// Run an operation under the given retry policy, sleeping with
/// exponential backoff between attempts. Only errors the classifier marks
/// transient are retried; the last error is returned once the attempt
/// budget is spent.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts.max(1) && is_transient(&error) => {
                tokio::time::sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
