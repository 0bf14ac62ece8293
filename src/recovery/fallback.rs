//! Fallback values for optional data paths.

use std::future::Future;

use crate::error::ErrorModel;

/// Await `future`; on any failure return `default` instead.
pub async fn with_fallback<T>(
    future: impl Future<Output = Result<T, ErrorModel>>,
    default: T,
) -> Result<T, ErrorModel> {
    with_fallback_else(future, |_| default).await
}

/// Await `future`; on any failure return the value produced by `fallback`.
pub async fn with_fallback_else<T, F>(
    future: impl Future<Output = Result<T, ErrorModel>>,
    fallback: F,
) -> Result<T, ErrorModel>
where
    F: FnOnce(&ErrorModel) -> T,
{
    match future.await {
        Ok(value) => Ok(value),
        Err(error) => {
            tracing::debug!(code = %error.code(), error = %error, "Using fallback value");
            Ok(fallback(&error))
        }
    }
}
