use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use catalog_cache::cache::{CacheConfig, Memoized, TieredCache};
use catalog_cache::coalesce::Coalescer;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_summary_requests_generate_once() {
    let coalescer: Arc<Coalescer<String, String>> = Arc::new(Coalescer::new());
    let generations = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(32));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let coalescer = coalescer.clone();
        let generations = generations.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coalescer
                .coalesce("ai_summary:9780441013593", move || async move {
                    generations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, String>("A duke's son inherits a desert planet.".to_string())
                })
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task should not panic"));
    }

    assert_eq!(generations.load(Ordering::SeqCst), 1);
    assert!(
        results
            .iter()
            .all(|result| result.as_deref() == Ok("A duke's son inherits a desert planet."))
    );
    assert_eq!(coalescer.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_is_shared_then_retried() {
    let coalescer: Arc<Coalescer<u32, String>> = Arc::new(Coalescer::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coalescer = coalescer.clone();
        let attempts = attempts.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coalescer
                .coalesce("cover:123:L", move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err::<u32, _>("image service timed out".to_string())
                })
                .await
        }));
    }
    for handle in handles {
        assert_eq!(
            handle.await.expect("task should not panic"),
            Err("image service timed out".to_string())
        );
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let retry = coalescer
        .coalesce("cover:123:L", || async { Ok::<_, String>(200) })
        .await;
    assert_eq!(retry, Ok(200));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_initiator_leaves_computation_running_for_others() {
    let coalescer: Arc<Coalescer<u32, String>> = Arc::new(Coalescer::new());
    let runs = Arc::new(AtomicUsize::new(0));

    let initiator = {
        let coalescer = coalescer.clone();
        let runs = runs.clone();
        tokio::spawn(async move {
            coalescer
                .coalesce("books:1:20", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, String>(20)
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let follower = {
        let coalescer = coalescer.clone();
        let runs = runs.clone();
        tokio::spawn(async move {
            coalescer
                .coalesce("books:1:20", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(0)
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    initiator.abort();
    assert_eq!(follower.await.expect("follower completes"), Ok(20));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memoized_fill_runs_once_and_is_cached() {
    let cache = Arc::new(TieredCache::local_only(&CacheConfig::default()));
    let summaries: Arc<Memoized<str, String, String>> = Arc::new(Memoized::new(
        cache.clone(),
        "ai_summary",
        Duration::from_secs(3600),
        |isbn: &str| isbn.to_string(),
    ));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let summaries = summaries.clone();
        let calls = calls.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            summaries
                .get_or_compute("9780547928227", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok("There and back again.".to_string())
                })
                .await
        }));
    }
    for handle in handles {
        assert_eq!(
            handle.await.expect("task should not panic").as_deref(),
            Ok("There and back again.")
        );
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        cache.get_typed::<String>("ai_summary:9780547928227").await.as_deref(),
        Some("There and back again.")
    );
}
