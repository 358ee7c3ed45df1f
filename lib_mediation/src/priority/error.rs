//! # Mediation Errors
//!
//! Every engine returns [`MediationError`]. The set of kinds is closed so
//! callers (the HTTP layer in particular) branch on [`ErrorKind`] rather than
//! on message text.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the source of storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shorthand result for the priority module.
pub type Result<T> = std::result::Result<T, MediationError>;

#[derive(Debug, Error)]
pub enum MediationError {
    /// A required parameter is missing or malformed. Never retried.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    /// The store failed. `operation` names the store step.
    #[error("storage operation `{operation}` failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The bounded wait elapsed before the operation finished.
    #[error("`{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Discriminant of [`MediationError`] without its context fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Timeout,
}

impl MediationError {
    pub fn validation(field: &'static str, reason: &'static str) -> Self {
        MediationError::Validation { field, reason }
    }

    pub fn storage(operation: &'static str, source: impl Into<BoxError>) -> Self {
        MediationError::Storage {
            operation,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MediationError::Validation { .. } => ErrorKind::Validation,
            MediationError::Storage { .. } => ErrorKind::Storage,
            MediationError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Runs `fut` under a fixed deadline, mapping expiry to [`MediationError::Timeout`].
///
/// The future is dropped on expiry; stores must leave no partial state behind
/// when that happens.
pub async fn bounded<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(MediationError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            MediationError::validation("networks", "must not be empty").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MediationError::storage("upsert_network", "connection reset").kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let err = MediationError::storage("commit", "connection reset");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("commit"));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let after = Duration::from_millis(10);
        let res: Result<()> = bounded("select", after, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match res {
            Err(MediationError::Timeout { operation, after: a }) => {
                assert_eq!(operation, "select");
                assert_eq!(a, after);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let res = bounded("select", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
