mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_cache::cache::{RemoteStore, TieredCache};
use catalog_cache::coalesce::Coalescer;
use catalog_cache::infra::telemetry;
use futures::future::join_all;
use metrics_util::debugging::DebuggingRecorder;

use support::{SharedRemote, config_with_capacity};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    // Remote hit, local hit after an outage, remote errors, miss, eviction
    let remote = SharedRemote::new();
    let cache = TieredCache::new(
        &config_with_capacity(1),
        Some(remote.clone() as Arc<dyn RemoteStore>),
    );
    let ttl = Duration::from_secs(60);

    cache.set("cover:1:S", vec![1_u8], ttl).await;
    assert!(cache.get("cover:1:S").await.is_some());
    cache.set("cover:2:S", vec![2_u8], Duration::from_secs(120)).await;

    remote.set_down(true);
    assert!(cache.get("cover:2:S").await.is_some());
    assert!(cache.get("cover:3:S").await.is_none());

    // Coalesced computation with one joined caller
    let coalescer: Coalescer<u32, String> = Coalescer::new();
    let calls = (0..2).map(|_| {
        coalescer.coalesce("ai_summary:1", || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, String>(1)
        })
    });
    assert!(join_all(calls).await.iter().all(|result| result == &Ok(1)));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "catalog_cache_remote_hit_total",
        "catalog_cache_local_hit_total",
        "catalog_cache_miss_total",
        "catalog_cache_local_evict_total",
        "catalog_cache_remote_error_total",
        "catalog_cache_coalesce_joined_total",
        "catalog_cache_compute_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
