//! 端到端流水线场景
//!
//! FakeExtractor + FileContentStore + InMemoryLifecycleManager + SymphoniaPreviewSynthesizer

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::purge_scratch;
use crate::application::{
    ApplicationError, ArtifactLifecyclePort, ContentStorePort, ExtractionError, PipelineEvent,
    PipelineSettings, PreviewReady, RequestFullCommand, RequestFullHandler, SubmitQueryCommand,
    SubmitQueryHandler,
};
use crate::domain::retention::RetentionPolicy;
use crate::domain::track::AudioFormat;
use crate::infrastructure::adapters::preview::mp3::count_frames;
use crate::infrastructure::adapters::{FakeExtractor, FileContentStore, SymphoniaPreviewSynthesizer};
use crate::infrastructure::memory::{InMemoryLifecycleManager, LifecycleConfig};

struct Harness {
    _dir: tempfile::TempDir,
    scratch: PathBuf,
    extractor: Arc<FakeExtractor>,
    store: Arc<FileContentStore>,
    lifecycle: Arc<InMemoryLifecycleManager>,
    pipeline: SubmitQueryHandler,
    full: RequestFullHandler,
}

async fn harness(
    extractor: FakeExtractor,
    policy: RetentionPolicy,
    handle_ttl: Duration,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    let extractor = Arc::new(extractor);
    let store = FileContentStore::open(dir.path().join("store")).await.unwrap().arc();
    let lifecycle = Arc::new(InMemoryLifecycleManager::new(
        store.clone(),
        LifecycleConfig {
            policy,
            artifact_ttl: Duration::from_millis(50),
            ..LifecycleConfig::default()
        },
    ));
    let settings = PipelineSettings {
        preview_max: Duration::from_secs(30),
        handle_ttl,
        max_concurrent_downloads: 2,
        scratch_dir: scratch.clone(),
    };
    let pipeline = SubmitQueryHandler::new(
        extractor.clone(),
        store.clone(),
        Arc::new(SymphoniaPreviewSynthesizer::new()),
        lifecycle.clone(),
        settings,
    );
    let full = RequestFullHandler::new(store.clone(), lifecycle.clone());

    Harness {
        _dir: dir,
        scratch,
        extractor,
        store,
        lifecycle,
        pipeline,
        full,
    }
}

fn names(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(PipelineEvent::name).collect()
}

fn ready(events: Vec<PipelineEvent>) -> PreviewReady {
    match events.into_iter().last() {
        Some(PipelineEvent::PreviewReady(ready)) => ready,
        other => panic!("expected PreviewReady, got {:?}", other),
    }
}

fn scratch_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn test_search_downloads_caches_and_previews() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(45));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let events = h
        .pipeline
        .handle(SubmitQueryCommand::new("42", "song X"))
        .collect()
        .await;

    assert_eq!(
        names(&events),
        vec!["searching", "downloading", "cached", "preview_ready"]
    );
    let ready = ready(events);
    assert_eq!(ready.preview.duration_ms, 30_000);
    assert_eq!(ready.preview.source_duration_ms, Some(45_000));
    assert!(h.store.exists(&ready.key).await.unwrap());
    assert_eq!(h.lifecycle.stats().await.live_handles, 1);
    assert!(scratch_is_empty(&h.scratch));
}

#[tokio::test]
async fn test_short_track_preview_is_whole_track() {
    let extractor = FakeExtractor::new().with_track("short one", "short000001", Duration::from_secs(10));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let ready = h
        .pipeline
        .run(SubmitQueryCommand::new("42", "short one"))
        .await
        .unwrap();
    assert_eq!(ready.preview.duration_ms, 10_000);

    // 短于上限的 WAV 原样返回
    let data = h.store.read(&h.store.get(&ready.key).await.unwrap().unwrap()).await.unwrap();
    assert_eq!(ready.preview.audio_data, data);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_download() {
    let extractor = FakeExtractor::new()
        .with_track("song x", "songx000001", Duration::from_secs(20))
        .with_delay(Duration::from_millis(200));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let first = h.pipeline.handle(SubmitQueryCommand::new("alice", "song X"));
    let second = h.pipeline.handle(SubmitQueryCommand::new("bob", "song x"));
    let (a, b) = tokio::join!(first.collect(), second.collect());

    let a = ready(a);
    let b = ready(b);
    assert_eq!(h.extractor.fetch_count(), 1);
    assert_eq!(a.key, b.key);
    assert_ne!(a.handle, b.handle);
    assert_eq!(h.store.list().await.unwrap().len(), 1);
    assert_eq!(h.lifecycle.stats().await.live_handles, 2);
}

#[tokio::test]
async fn test_full_delivery_is_single_use() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let ready = h.pipeline.run(SubmitQueryCommand::new("42", "song x")).await.unwrap();
    let artifact = h.store.get(&ready.key).await.unwrap().unwrap();

    let delivery = h
        .full
        .handle(RequestFullCommand::new(ready.handle.to_string()))
        .await
        .unwrap();
    assert_eq!(delivery.requester_id(), "42");
    let bytes = delivery.read_all().await.unwrap();
    assert_eq!(bytes.len() as u64, artifact.size_bytes);

    assert!(!h.store.exists(&ready.key).await.unwrap());
    assert!(!artifact.path.exists());

    let again = h
        .full
        .handle(RequestFullCommand::new(ready.handle.to_string()))
        .await;
    assert!(matches!(again, Err(ApplicationError::HandleNotFound(_))));
}

#[tokio::test]
async fn test_shared_artifact_survives_until_last_delivery() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let a = h.pipeline.run(SubmitQueryCommand::new("alice", "song x")).await.unwrap();
    let b = h.pipeline.run(SubmitQueryCommand::new("bob", "song x")).await.unwrap();
    assert_eq!(h.extractor.fetch_count(), 1);

    h.full
        .handle(RequestFullCommand::new(a.handle.to_string()))
        .await
        .unwrap()
        .read_all()
        .await
        .unwrap();
    assert!(h.store.exists(&b.key).await.unwrap());

    h.full
        .handle(RequestFullCommand::new(b.handle.to_string()))
        .await
        .unwrap()
        .read_all()
        .await
        .unwrap();
    assert!(!h.store.exists(&b.key).await.unwrap());
}

#[tokio::test]
async fn test_unconsumed_handle_is_reclaimed_after_ttl() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_millis(50)).await;

    let ready = h.pipeline.run(SubmitQueryCommand::new("42", "song x")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let report = h.lifecycle.sweep().await;
    assert_eq!(report.expired_handles, 1);
    assert!(!h.store.exists(&ready.key).await.unwrap());

    let late = h
        .full
        .handle(RequestFullCommand::new(ready.handle.to_string()))
        .await;
    assert!(matches!(late, Err(ApplicationError::HandleExpired(_))));
}

#[tokio::test]
async fn test_not_found_fails_without_side_effects() {
    let extractor = FakeExtractor::new().with_probe_failure(
        "zzzz nothing",
        ExtractionError::NotFound("no results".to_string()),
    );
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let events = h
        .pipeline
        .handle(SubmitQueryCommand::new("42", "zzzz nothing"))
        .collect()
        .await;

    assert_eq!(names(&events), vec!["searching", "failed"]);
    match events.last() {
        Some(PipelineEvent::Failed { reason, kind }) => {
            assert_eq!(reason, "could not fetch this track");
            assert_eq!(*kind, "not_found");
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(h.extractor.fetch_count(), 0);
    assert!(h.store.list().await.unwrap().is_empty());
    assert_eq!(h.lifecycle.stats().await.live_handles, 0);
    assert!(scratch_is_empty(&h.scratch));
}

#[tokio::test]
async fn test_fetch_failure_leaves_no_scratch_files() {
    let extractor = FakeExtractor::new()
        .with_track("broken", "broken00001", Duration::from_secs(5))
        .with_fetch_failure(
            "broken00001",
            ExtractionError::NetworkFailure("connection reset".to_string()),
        );
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let err = h
        .pipeline
        .run(SubmitQueryCommand::new("42", "broken"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "network_failure");
    assert!(h.store.list().await.unwrap().is_empty());
    assert!(scratch_is_empty(&h.scratch));
    assert_eq!(h.pipeline.downloads_in_flight(), 0);
}

#[tokio::test]
async fn test_cancelled_requester_does_not_abort_shared_download() {
    let extractor = FakeExtractor::new()
        .with_track("song x", "songx000001", Duration::from_secs(5))
        .with_delay(Duration::from_millis(200));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let mut leaver = h.pipeline.handle(SubmitQueryCommand::new("alice", "song x"));
    loop {
        match leaver.recv().await {
            Some(PipelineEvent::Downloading { .. }) => break,
            Some(_) => continue,
            None => panic!("pipeline ended early"),
        }
    }
    drop(leaver);

    let events = h
        .pipeline
        .handle(SubmitQueryCommand::new("bob", "song x"))
        .collect()
        .await;
    let ready = ready(events);

    assert_eq!(h.extractor.fetch_count(), 1);
    assert!(h.store.exists(&ready.key).await.unwrap());

    // 离开的请求方不持有句柄
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.lifecycle.stats().await.live_handles, 1);
}

#[tokio::test]
async fn test_ttl_policy_reuses_cached_artifact() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::Ttl, Duration::from_secs(60)).await;

    let first = h.pipeline.run(SubmitQueryCommand::new("42", "song x")).await.unwrap();
    h.full
        .handle(RequestFullCommand::new(first.handle.to_string()))
        .await
        .unwrap()
        .read_all()
        .await
        .unwrap();
    assert!(h.store.exists(&first.key).await.unwrap());

    let events = h
        .pipeline
        .handle(SubmitQueryCommand::new("42", "song x"))
        .collect()
        .await;
    assert_eq!(names(&events), vec!["searching", "cached", "preview_ready"]);
    match &events[1] {
        PipelineEvent::Cached { reused, .. } => assert!(*reused),
        other => panic!("expected Cached, got {:?}", other),
    }
    assert_eq!(h.extractor.fetch_count(), 1);
}

#[tokio::test]
async fn test_link_and_search_resolve_to_same_artifact() {
    let extractor = FakeExtractor::new().with_track("rick", "dQw4w9WgXcQ", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::Ttl, Duration::from_secs(60)).await;

    let by_search = h.pipeline.run(SubmitQueryCommand::new("42", "rick")).await.unwrap();
    let by_link = h
        .pipeline
        .run(SubmitQueryCommand::new("42", "https://youtu.be/dQw4w9WgXcQ"))
        .await
        .unwrap();

    assert_eq!(by_search.key, by_link.key);
    assert_eq!(by_search.metadata, by_link.metadata);
    assert_eq!(h.extractor.fetch_count(), 1);
    // 已缓存的链接不再 probe
    assert_eq!(h.extractor.probe_count(), 1);
}

#[tokio::test]
async fn test_garbage_handle_is_not_found() {
    let h = harness(FakeExtractor::new(), RetentionPolicy::SingleUse, Duration::from_secs(60)).await;
    let result = h.full.handle(RequestFullCommand::new("not-a-handle")).await;
    assert!(matches!(result, Err(ApplicationError::HandleNotFound(_))));
}

#[tokio::test]
async fn test_subscription_stream_ends_after_terminal_event() {
    let h = harness(FakeExtractor::new(), RetentionPolicy::SingleUse, Duration::from_secs(60)).await;
    let events: Vec<PipelineEvent> = h
        .pipeline
        .handle(SubmitQueryCommand::new("42", "anything at all"))
        .into_stream()
        .collect()
        .await;
    assert_eq!(
        names(&events),
        vec!["searching", "downloading", "cached", "preview_ready"]
    );
}

#[tokio::test]
async fn test_mp3_track_preview_keeps_source_encoding() {
    let extractor = FakeExtractor::new()
        .with_format(AudioFormat::Mp3)
        .with_track("long mp3", "longmp30001", Duration::from_secs(45))
        .with_track("short mp3", "shortmp3001", Duration::from_secs(10));
    let h = harness(extractor, RetentionPolicy::Ttl, Duration::from_secs(60)).await;

    let long = h.pipeline.run(SubmitQueryCommand::new("42", "long mp3")).await.unwrap();
    assert_eq!(long.preview.format, AudioFormat::Mp3);
    assert_eq!(count_frames(&long.preview.audio_data), 833);
    assert!(long.preview.duration_ms <= 30_000);
    assert!(long.preview.duration_ms <= long.preview.source_duration_ms.unwrap());

    // 同一缓存制品再次预览，输出逐字节相同
    let again = h.pipeline.run(SubmitQueryCommand::new("43", "long mp3")).await.unwrap();
    assert_eq!(again.preview.audio_data, long.preview.audio_data);
    assert_eq!(h.extractor.fetch_count(), 1);

    let short = h.pipeline.run(SubmitQueryCommand::new("42", "short mp3")).await.unwrap();
    let artifact = h.store.get(&short.key).await.unwrap().unwrap();
    assert_eq!(artifact.format, AudioFormat::Mp3);
    assert_eq!(short.preview.format, AudioFormat::Mp3);
    assert_eq!(short.preview.audio_data, h.store.read(&artifact).await.unwrap());
    assert_eq!(short.preview.duration_ms, 9972);
}

#[tokio::test]
async fn test_purge_scratch_removes_leftover_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    std::fs::create_dir_all(scratch.join("fetch-abc123")).unwrap();
    std::fs::write(scratch.join("fetch-abc123").join("partial.mp3.part"), b"half").unwrap();
    std::fs::write(scratch.join("fetch-stray"), b"x").unwrap();
    std::fs::write(scratch.join("notes.txt"), b"keep").unwrap();

    assert_eq!(purge_scratch(&scratch).await.unwrap(), 2);
    assert!(!scratch.join("fetch-abc123").exists());
    assert!(!scratch.join("fetch-stray").exists());
    assert!(scratch.join("notes.txt").exists());

    assert_eq!(purge_scratch(&dir.path().join("missing")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delivery_dropped_outside_runtime_is_released() {
    let extractor = FakeExtractor::new().with_track("song x", "songx000001", Duration::from_secs(5));
    let h = harness(extractor, RetentionPolicy::SingleUse, Duration::from_secs(60)).await;

    let ready = h.pipeline.run(SubmitQueryCommand::new("42", "song x")).await.unwrap();
    let delivery = h
        .full
        .handle(RequestFullCommand::new(ready.handle.to_string()))
        .await
        .unwrap();
    assert_eq!(h.lifecycle.stats().await.pinned_artifacts, 1);

    std::thread::spawn(move || drop(delivery)).join().unwrap();

    assert_eq!(h.lifecycle.stats().await.pinned_artifacts, 0);
    assert!(!h.store.exists(&ready.key).await.unwrap());
}
