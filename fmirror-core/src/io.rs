use anyhow::{Context, Result};
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Bounded retry schedule for transient I/O failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Wait between attempts.
    pub delay: Duration,
    /// Give up once cumulative waiting reaches this.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_wait: Duration::from_millis(3000),
        }
    }
}

// Windows sharing violation / lock violation.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Whether an I/O error is worth retrying: the file is locked, busy, or
/// briefly unavailable. Anything else fails immediately.
fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::PermissionDenied
    ) {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
    )
}

/// Run `op` until it succeeds, a non-transient error occurs, or the retry
/// budget is spent. Each retry is reported through the log.
async fn with_retry<T, F, Fut>(what: &str, path: &Path, policy: RetryPolicy, mut op: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut waited = Duration::ZERO;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && waited < policy.max_wait => {
                warn!(
                    "{what} {} failed ({e}), retrying in {}ms",
                    path.display(),
                    policy.delay.as_millis()
                );
                tokio::time::sleep(policy.delay).await;
                waited += policy.delay;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read a file's full contents, retrying transient failures. Exhausting the
/// retry budget is an error: with nothing read there is nothing to copy.
pub async fn read_all_with_retry(path: &Path, policy: RetryPolicy) -> Result<Vec<u8>> {
    with_retry("reading", path, policy, || tokio::fs::read(path))
        .await
        .with_context(|| format!("read {}", path.display()))
}

/// Write a file's full contents, retrying transient failures. Exhausting the
/// retry budget is reported and abandoned: the read already succeeded, so
/// this copy is best-effort for the current event.
pub async fn write_all_with_retry(path: &Path, contents: &[u8], policy: RetryPolicy) {
    if let Err(e) = with_retry("writing", path, policy, || tokio::fs::write(path, contents)).await {
        warn!("giving up writing {}: {e}", path.display());
    }
}
