use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::utils::error::AppError;

pub type PgTx = Transaction<'static, Postgres>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the shared connection pool. Row-lock waits are bounded by setting
/// `lock_timeout` on every connection, so a blocked `FOR UPDATE` fails
/// instead of waiting forever.
pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool, AppError> {
    let options: PgConnectOptions = cfg
        .url
        .parse()
        .map_err(|e: sqlx::Error| AppError::Internal(format!("invalid DATABASE_URL: {e}")))?;
    let options = options.options([("lock_timeout", cfg.lock_timeout.as_millis().to_string())]);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_open_conns)
        .min_connections(cfg.max_idle_conns)
        .max_lifetime(cfg.conn_max_lifetime)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Runs `op` inside a transaction at the store's default Read-Committed
/// isolation; consistency comes from explicit `FOR UPDATE` row locks taken
/// by the contended paths. Commits iff `op` succeeds. A rollback failure is
/// logged and the primary error is returned; dropping an uncommitted
/// transaction also rolls back, which covers unwinds.
pub async fn with_tx<T, F>(pool: &PgPool, op: F) -> Result<T, AppError>
where
    F: for<'t> FnOnce(&'t mut PgTx) -> BoxFuture<'t, Result<T, AppError>>,
{
    let mut tx = pool.begin().await?;

    match op(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to rollback transaction");
            }
            Err(err)
        }
    }
}

/// Invokes `op` up to `max_retries + 1` times, sleeping `delay` between
/// attempts. Only transient conflicts (deadlock, serialization failure,
/// connection trouble) are retried; everything else returns immediately.
pub async fn with_retry<T, F, Fut>(
    max_retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }
                if attempt >= max_retries {
                    return Err(AppError::Internal(format!(
                        "operation failed after {max_retries} retries: {err:?}"
                    )));
                }
                attempt += 1;
                tracing::warn!(
                    error = ?err,
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed with transient error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_with_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AppError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_domain_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retry(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Conflict("seat taken".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retry(2, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Database(sqlx::Error::PoolTimedOut)) }
        })
        .await;
        // 1 initial attempt + 2 retries, then the final cause is wrapped.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AppError::Internal(msg)) => assert!(msg.contains("after 2 retries")),
            other => panic!("expected wrapped retry exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, Duration::ZERO, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AppError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok("booked")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "booked");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
