//! Batches of labelled operations with aggregate failure reporting.

use std::future::Future;

use futures::future::join_all;

use crate::error::{AggregateFailure, ErrorModel};

/// Per-operation results of a batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Successful results in submission order.
    pub succeeded: Vec<(String, T)>,
    /// `BATCH_PARTIAL_FAILURE` when at least one operation failed.
    pub error: Option<ErrorModel>,
}

impl<T> BatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Run every operation concurrently and report successes and failures separately.
pub async fn settle_all<T, L, Fut, I>(operations: I) -> BatchReport<T>
where
    I: IntoIterator<Item = (L, Fut)>,
    L: Into<String>,
    Fut: Future<Output = Result<T, ErrorModel>>,
{
    let (labels, futures): (Vec<String>, Vec<Fut>) = operations
        .into_iter()
        .map(|(label, future)| (label.into(), future))
        .unzip();

    let results = join_all(futures).await;

    let mut aggregate = AggregateFailure::new();
    let mut succeeded = Vec::new();
    for (label, result) in labels.into_iter().zip(results) {
        match result {
            Ok(value) => {
                aggregate.record_success();
                succeeded.push((label, value));
            }
            Err(error) => aggregate.push(label, error),
        }
    }

    let error = if aggregate.failed > 0 {
        tracing::debug!(
            failed = aggregate.failed,
            succeeded = aggregate.succeeded,
            "Batch finished with failures"
        );
        Some(ErrorModel::aggregate(aggregate))
    } else {
        None
    };

    BatchReport { succeeded, error }
}

/// Run every operation concurrently; all values in submission order, or the
/// aggregate failure.
pub async fn run_all<T, L, Fut, I>(operations: I) -> Result<Vec<T>, ErrorModel>
where
    I: IntoIterator<Item = (L, Fut)>,
    L: Into<String>,
    Fut: Future<Output = Result<T, ErrorModel>>,
{
    let report = settle_all(operations).await;
    match report.error {
        Some(error) => Err(error),
        None => Ok(report.succeeded.into_iter().map(|(_, value)| value).collect()),
    }
}
