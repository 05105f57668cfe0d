//! Integration tests for the task exporter against a mock server.

use annomerge_sdk::{
    ExportStatus, ExportStrategy, ListingRoute, ProjectId, SdkConfig, SdkError, SnapshotOptions,
    StreamOptions, StudioClient,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StudioClient {
    StudioClient::new(SdkConfig::new(server.uri())).unwrap()
}

/// Build a zip archive holding one member, the way the server packages
/// snapshot downloads.
fn snapshot_zip(member: &str, body: &serde_json::Value) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer.start_file(member, options).unwrap();
    writer.write_all(body.to_string().as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

async fn mount_collection_probe(server: &MockServer, project: i64) {
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("project", project.to_string()))
        .and(query_param("fields", "task_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "tasks": []})))
        .mount(server)
        .await;
}

// ===== Route Probe Tests =====

#[tokio::test]
async fn test_probe_pins_collection_route() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    assert_eq!(exporter.route(), ListingRoute::TaskCollection);
}

#[tokio::test]
async fn test_probe_demotes_to_scoped_route_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/tasks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    assert_eq!(exporter.route(), ListingRoute::ProjectScoped);
}

#[tokio::test]
async fn test_probe_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.exporter(ProjectId(12)).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

// ===== Stream Export Tests =====

#[tokio::test]
async fn test_stream_walks_collection_pages() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("fields", "all"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "tasks": [
                {"id": 1, "data": {"image": "a.jpg"}, "annotations": [{"result": [{"v": 1}]}]},
                {"id": 2, "data": {"image": "b.jpg"}}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("fields", "all"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "tasks": [{"id": 3, "data": {"image": "c.jpg"}}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let strategy = ExportStrategy::Stream(StreamOptions::new().with_page_size(2));
    let report = exporter.export(ProjectId(12), &strategy).await.unwrap();

    assert!(!report.fell_back);
    assert_eq!(report.batch.project_id, ProjectId(12));
    assert_eq!(report.batch.len(), 3);
    // annotations carried, server ids dropped
    assert!(report.batch.tasks[0].annotations.is_some());
    assert_eq!(report.batch.tasks[2].data["image"], json!("c.jpg"));
}

#[tokio::test]
async fn test_stream_scoped_bare_array_is_one_shot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/tasks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "data": {"image": "a.jpg"}},
            {"id": 2, "data": {"image": "b.jpg"}}
        ])))
        .expect(2) // once for the probe, once for the export
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let report = exporter
        .export(ProjectId(12), &ExportStrategy::stream())
        .await
        .unwrap();

    assert_eq!(report.batch.len(), 2);
}

#[tokio::test]
async fn test_stream_scoped_envelope_follows_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/tasks/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"data": {"image": "a.jpg"}}],
            "next": format!("{}/api/projects/12/tasks/?page=2", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/tasks/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"data": {"image": "b.jpg"}}],
            "next": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let strategy = ExportStrategy::Stream(StreamOptions::new().with_page_size(1));
    let report = exporter.export(ProjectId(12), &strategy).await.unwrap();

    assert_eq!(report.batch.len(), 2);
    assert_eq!(report.batch.tasks[1].data["image"], json!("b.jpg"));
}

// ===== Snapshot Export Tests =====

#[tokio::test]
async fn test_snapshot_create_poll_download_decode() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("POST"))
        .and(path("/api/projects/12/exports/"))
        .and(body_partial_json(json!({"title": "nightly"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 7, "status": "created"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    // first poll still running, second completed
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/7/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "status": "in_progress"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/7/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "status": "completed"})),
        )
        .mount(&server)
        .await;

    let archive = snapshot_zip(
        "tasks.json",
        &json!([
            {
                "id": 41,
                "data": {"image": "s.png"},
                "annotations": [{"result": [{"value": "cat"}]}],
                "predictions": [{"result": [{"value": "dog"}]}]
            }
        ]),
    );
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/7/download/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let strategy = ExportStrategy::Snapshot(
        SnapshotOptions::new()
            .with_title("nightly")
            .with_poll_interval(Duration::from_millis(10)),
    );
    let report = exporter.export(ProjectId(12), &strategy).await.unwrap();

    assert!(!report.fell_back);
    assert_eq!(report.batch.len(), 1);
    let task = &report.batch.tasks[0];
    assert_eq!(task.data["image"], json!("s.png"));
    // snapshots carry both annotations and predictions
    assert!(task.annotations.is_some());
    assert!(task.predictions.is_some());
}

#[tokio::test]
async fn test_snapshot_create_failure_falls_back_to_stream() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("POST"))
        .and(path("/api/projects/12/exports/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exports unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("fields", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "tasks": [{"data": {"image": "f.png"}, "annotations": [{"result": []}], "predictions": [{"result": []}]}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let report = exporter
        .export(ProjectId(12), &ExportStrategy::snapshot())
        .await
        .unwrap();

    assert!(report.fell_back);
    assert_eq!(report.batch.len(), 1);
}

#[tokio::test]
async fn test_snapshot_timeout_without_download() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("POST"))
        .and(path("/api/projects/12/exports/"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 9, "status": "in_progress"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/9/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 9, "status": "in_progress"})),
        )
        .mount(&server)
        .await;
    // the archive must never be requested on timeout
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/9/download/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let strategy = ExportStrategy::Snapshot(
        SnapshotOptions::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(60)),
    );
    let err = exporter.export(ProjectId(12), &strategy).await.unwrap_err();

    assert!(matches!(
        err,
        SdkError::Timeout {
            project: ProjectId(12),
            ..
        }
    ));
}

#[tokio::test]
async fn test_snapshot_failed_job_surfaces_status() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("POST"))
        .and(path("/api/projects/12/exports/"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 3, "status": "failed"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let err = exporter
        .export(ProjectId(12), &ExportStrategy::snapshot())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SdkError::ExportFailed {
            status: ExportStatus::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_snapshot_status_refresh_retries_via_job_list() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("POST"))
        .and(path("/api/projects/12/exports/"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 5, "status": "in_progress"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/5/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("flaky"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 4, "status": "completed"},
            {"id": 5, "status": "completed"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/12/exports/5/download/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(snapshot_zip(
            "result.json",
            &json!({"tasks": [{"data": {"image": "z.png"}}]}),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let strategy = ExportStrategy::Snapshot(
        SnapshotOptions::new().with_poll_interval(Duration::from_millis(10)),
    );
    let report = exporter.export(ProjectId(12), &strategy).await.unwrap();

    assert_eq!(report.batch.len(), 1);
    assert_eq!(report.batch.tasks[0].data["image"], json!("z.png"));
}

// ===== Annotation Count Tests =====

#[tokio::test]
async fn test_count_annotations_streams_the_listing() {
    let server = MockServer::start().await;
    mount_collection_probe(&server, 12).await;

    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("fields", "annotations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "tasks": [
                {"id": 1, "annotations": [{"result": []}, {"result": []}]},
                {"id": 2, "annotations": []}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exporter = client.exporter(ProjectId(12)).await.unwrap();
    let count = exporter.count_annotations(ProjectId(12)).await.unwrap();

    assert_eq!(count.tasks, 2);
    assert_eq!(count.annotations, 2);
}
