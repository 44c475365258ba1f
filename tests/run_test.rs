//! Experiment run tests
//!
//! Write-path semantics per mode, tag-form equivalence, last-write-wins
//! values, append-only series, file uploads, and close discipline.

use std::sync::Arc;

use trueno_track::{
    ApiToken, Error, ExperimentRun, MemoryBackend, Project, RunMode, SyncCommand, TrackingBackend,
};

async fn fixture() -> (Arc<MemoryBackend>, Project<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let project = Project::new(
        Arc::clone(&backend),
        ApiToken::new("test-token"),
        "acme",
        "churn-model",
        "CHURN",
    );
    project.create().await.unwrap();
    (backend, project)
}

#[tokio::test]
async fn test_open_assigns_id_and_url() {
    let (_backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    assert_eq!(run.run_info().run_id(), "CHURN-1");
    assert!(run.run_info().run_url().contains("acme/churn-model"));
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_single_tag_and_sequence_produce_same_set() {
    let (backend, project) = fixture().await;

    let first = ExperimentRun::open(&project, RunMode::Async).await.unwrap();
    first.add_tags("baseline").await.unwrap();
    first.add_tags("lightgbm").await.unwrap();
    let single_id = first.run_info().run_id().to_string();
    first.stop().await.unwrap();

    let second = ExperimentRun::open(&project, RunMode::Async).await.unwrap();
    second.add_tags(["baseline", "lightgbm"]).await.unwrap();
    let sequence_id = second.run_info().run_id().to_string();
    second.stop().await.unwrap();

    assert_eq!(
        backend.run_tags(&single_id).unwrap(),
        backend.run_tags(&sequence_id).unwrap()
    );
}

#[tokio::test]
async fn test_repeated_tags_do_not_duplicate() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    run.add_tags(["a", "b"]).await.unwrap();
    run.add_tags(["b", "a", "c"]).await.unwrap();

    assert_eq!(
        backend.run_tags(run.run_info().run_id()).unwrap(),
        vec!["a", "b", "c"]
    );
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_log_value_overwrites_not_merges() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    run.log_value(
        "parameters",
        serde_json::json!({"lr": 0.001, "optimizer": "adam"}),
    )
    .await
    .unwrap();
    run.log_value("parameters", serde_json::json!({"batch_size": 8}))
        .await
        .unwrap();

    let value = backend
        .run_value(run.run_info().run_id(), "parameters")
        .unwrap();
    assert_eq!(value, serde_json::json!({"batch_size": 8}));
    assert!(value.get("lr").is_none());
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_log_series_accumulates_in_call_order() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    for epoch in 0..100 {
        let loss = 0.1_f64.powi(epoch);
        run.log_series("train", "loss", loss).await.unwrap();
    }

    let points = backend
        .run_series(run.run_info().run_id(), "train/loss")
        .unwrap();
    assert_eq!(points.len(), 100);
    for (epoch, point) in points.iter().enumerate() {
        let expected = 0.1_f64.powi(i32::try_from(epoch).unwrap());
        assert!((point.value() - expected).abs() < f64::EPSILON);
    }
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_series_for_distinct_metrics_are_independent() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    run.log_series("train", "loss", 0.5).await.unwrap();
    run.log_series("train", "accuracy", 0.9).await.unwrap();
    run.log_series("test", "loss", 0.6).await.unwrap();

    let id = run.run_info().run_id().to_string();
    assert_eq!(backend.run_series(&id, "train/loss").unwrap().len(), 1);
    assert_eq!(backend.run_series(&id, "train/accuracy").unwrap().len(), 1);
    assert_eq!(backend.run_series(&id, "test/loss").unwrap().len(), 1);
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_upload_records_names_and_sizes() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    run.upload("files", ["Cargo.toml", "README.md"]).await.unwrap();

    let files = backend
        .run_files(run.run_info().run_id(), "files")
        .unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name(), "Cargo.toml");
    assert_eq!(files[1].name(), "README.md");
    assert!(files.iter().all(|f| f.size_bytes() > 0));
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_upload_missing_file_is_io_error() {
    let (_backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();

    let err = run
        .upload("files", ["definitely-not-a-real-file.bin"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_backend_rejects_writes_after_stop() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Async).await.unwrap();
    let id = run.run_info().run_id().to_string();
    run.stop().await.unwrap();

    let err = backend
        .append_run_series(&id, "train/loss", 0.1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyClosed(_)));
}

#[tokio::test]
async fn test_read_only_run_rejects_writes() {
    let (_backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::ReadOnly)
        .await
        .unwrap();

    let err = run.log_series("train", "loss", 0.5).await.unwrap_err();
    assert!(matches!(err, Error::ReadOnlyRun(_)));
    run.stop().await.unwrap();
}

#[tokio::test]
async fn test_debug_run_discards_writes() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Debug).await.unwrap();

    run.log_value("parameters", serde_json::json!({"lr": 0.001}))
        .await
        .unwrap();
    let id = run.run_info().run_id().to_string();
    run.stop().await.unwrap();

    assert!(backend.run_value(&id, "parameters").is_none());
}

#[tokio::test]
async fn test_offline_run_publishes_on_stop() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Offline)
        .await
        .unwrap();

    run.log_series("train", "loss", 0.5).await.unwrap();
    let id = run.run_info().run_id().to_string();
    assert!(backend.run_series(&id, "train/loss").is_none());

    run.stop().await.unwrap();
    assert_eq!(backend.run_series(&id, "train/loss").unwrap().len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_offline_stop_invokes_sync_command() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Offline)
        .await
        .unwrap()
        .with_sync_command(SyncCommand::new("true"));
    let id = run.run_info().run_id().to_string();

    run.stop().await.unwrap();
    assert!(!backend.is_run_open(&id));
}

#[cfg(unix)]
#[tokio::test]
async fn test_offline_sync_failure_still_closes_run() {
    let (backend, project) = fixture().await;
    let run = ExperimentRun::open(&project, RunMode::Offline)
        .await
        .unwrap()
        .with_sync_command(SyncCommand::new("false"));
    let id = run.run_info().run_id().to_string();

    let err = run.stop().await.unwrap_err();
    assert!(matches!(err, Error::SyncFailed(_)));
    assert!(!backend.is_run_open(&id));
}

#[tokio::test]
async fn test_sync_command_not_invoked_outside_offline_mode() {
    let (backend, project) = fixture().await;
    // A command that would fail if invoked; async mode must never run it.
    let run = ExperimentRun::open(&project, RunMode::Async)
        .await
        .unwrap()
        .with_sync_command(SyncCommand::new("trueno-track-no-such-binary"));
    let id = run.run_info().run_id().to_string();

    run.stop().await.unwrap();
    assert!(!backend.is_run_open(&id));
}
