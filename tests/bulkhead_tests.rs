//! Tests for concurrency bulkheads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use faultline::error::ErrorModel;
use faultline::recovery::{Bulkhead, BulkheadConfig, BulkheadRegistry};
use tokio::time::Instant;

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn third_call_waits_for_a_free_slot() {
    let bulkhead = Bulkhead::new("uploads", 2);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let mut handles = Vec::new();
    for id in 0..3u32 {
        let bulkhead = bulkhead.clone();
        let active = active.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            bulkhead
                .call(move || async move {
                    let running = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(running, Ordering::SeqCst);
                    let began = started.elapsed();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ErrorModel>((id, began))
                })
                .await
        }));
    }
    settle().await;

    assert_eq!(bulkhead.in_flight(), 2);
    assert_eq!(bulkhead.queued(), 1);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(
        results,
        vec![
            (0, Duration::ZERO),
            (1, Duration::ZERO),
            (2, Duration::from_millis(100)),
        ]
    );
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(bulkhead.in_flight(), 0);
    assert_eq!(bulkhead.queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn queued_calls_run_in_arrival_order() {
    let bulkhead = Bulkhead::new("exports", 1);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..4u32 {
        let bulkhead = bulkhead.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            bulkhead
                .call(move || async move {
                    order.lock().unwrap().push(id);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, ErrorModel>(())
                })
                .await
        }));
        settle().await;
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn errors_release_the_slot() {
    let bulkhead = Bulkhead::new("imports", 1);

    let failed = bulkhead
        .call(|| async {
            Err::<(), _>(ErrorModel::new(
                faultline::error::ErrorCode::StorageAborted,
                "aborted",
            ))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(bulkhead.in_flight(), 0);

    let ok = bulkhead.call(|| async { Ok::<_, ErrorModel>(1) }).await;
    assert_eq!(ok.unwrap(), 1);
}

#[test]
fn zero_concurrency_is_clamped() {
    assert_eq!(Bulkhead::new("x", 0).max_concurrency(), 1);
}

#[tokio::test]
async fn registry_shares_one_limit_per_key() {
    let registry = BulkheadRegistry::new(BulkheadConfig::builder().max_concurrency(3).build());

    let first = registry.get("search");
    let second = registry.get("search");
    assert_eq!(first.max_concurrency(), 3);

    let value = registry
        .call("search", || async { Ok::<_, ErrorModel>("hit") })
        .await;
    assert_eq!(value.unwrap(), "hit");
    assert_eq!(first.in_flight(), second.in_flight());
    assert_eq!(second.name(), "search");

    registry.reset();
    assert_eq!(registry.get("search").in_flight(), 0);
}
