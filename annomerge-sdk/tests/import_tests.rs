//! Integration tests for chunked import against a mock server.

use annomerge_sdk::{ProjectId, SdkConfig, SdkError, StudioClient, Task};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StudioClient {
    StudioClient::new(SdkConfig::new(server.uri())).unwrap()
}

fn make_tasks(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| {
            let mut data = serde_json::Map::new();
            data.insert("index".to_string(), json!(i));
            Task::new(data)
        })
        .collect()
}

/// Sizes of the task arrays received by the import endpoint, in order.
async fn received_chunk_sizes(server: &MockServer) -> Vec<usize> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.method.as_str() == "POST" && req.url.path().ends_with("/import"))
        .map(|req| {
            serde_json::from_slice::<Vec<serde_json::Value>>(&req.body)
                .unwrap()
                .len()
        })
        .collect()
}

// ===== Chunking Tests =====

#[tokio::test]
async fn test_import_splits_into_batches_with_cumulative_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects/77/import"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let importer = client.importer().with_batch_size(1000);

    let tasks = make_tasks(2500);
    let mut progress: Vec<(usize, usize)> = Vec::new();
    let summary = importer
        .import_with_progress(ProjectId(77), &tasks, |sent, total| {
            progress.push((sent, total))
        })
        .await
        .unwrap();

    assert_eq!(progress, vec![(1000, 2500), (2000, 2500), (2500, 2500)]);
    assert_eq!(summary.tasks_sent, 2500);
    assert_eq!(summary.batches, 3);
    // server reported no counts, so the chunk sizes stand in
    assert_eq!(summary.task_count, 2500);

    assert_eq!(received_chunk_sizes(&server).await, vec![1000, 1000, 500]);
}

#[tokio::test]
async fn test_import_sums_server_reported_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects/5/import"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"task_count": 2, "annotation_count": 3})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let importer = client.importer().with_batch_size(2);

    let summary = importer
        .import(ProjectId(5), &make_tasks(4))
        .await
        .unwrap();

    assert_eq!(summary.task_count, 4);
    assert_eq!(summary.annotation_count, 6);
}

// ===== Failure Tests =====

#[tokio::test]
async fn test_failing_batch_reports_its_one_based_index() {
    let server = MockServer::start().await;
    // first batch lands, every later one fails
    Mock::given(method("POST"))
        .and(path("/api/projects/77/import"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/projects/77/import"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let importer = client.importer().with_batch_size(1000);

    let tasks = make_tasks(2500);
    let mut progress: Vec<(usize, usize)> = Vec::new();
    let err = importer
        .import_with_progress(ProjectId(77), &tasks, |sent, total| {
            progress.push((sent, total))
        })
        .await
        .unwrap_err();

    // only the successful batch reported progress
    assert_eq!(progress, vec![(1000, 2500)]);
    match err {
        SdkError::ImportBatchFailed { batch, source } => {
            assert_eq!(batch, 2);
            assert!(source.is_retryable());
        }
        other => panic!("expected ImportBatchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_import_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let summary = client
        .importer()
        .import(ProjectId(77), &[])
        .await
        .unwrap();

    assert_eq!(summary.tasks_sent, 0);
    assert_eq!(summary.batches, 0);
}
