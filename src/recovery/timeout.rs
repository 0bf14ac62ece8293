//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::{ErrorCode, ErrorModel};

/// Wrap a future with a deadline.
///
/// When the deadline fires first the future is dropped and a
/// `NETWORK_TIMEOUT` error is returned. Work the operation already handed
/// off elsewhere is not cancelled.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ErrorModel>>,
) -> Result<T, ErrorModel> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(timeout_error(duration)),
    }
}

pub(crate) fn timeout_error(duration: Duration) -> ErrorModel {
    ErrorModel::new(
        ErrorCode::NetworkTimeout,
        format!("operation timed out after {}ms", duration.as_millis()),
    )
}
