//! Upload orchestrator tests against a mocked ingestion API.
//!
//! Run with: `cargo test -p dlflow-api-client --test orchestrator_test`

mod helpers;

use dlflow_api_client::{LocalFile, UploadEvent, UploadOrchestrator};
use dlflow_core::models::JobStatus;
use dlflow_core::{FileValidationPolicy, ValidationErrorCode};
use helpers::{client_for, error_json, summary_json};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{any, body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn sales_csv() -> LocalFile {
    LocalFile::new(
        "sales.csv",
        "text/csv",
        "date,region,revenue\n2024-01-01,north,100.5\n".as_bytes().to_vec(),
    )
}

fn orchestrator(server: &MockServer) -> UploadOrchestrator {
    UploadOrchestrator::new(client_for(server), FileValidationPolicy::default())
}

/// Answers every upload with a summary under a new id.
struct FreshSummary;

impl Respond for FreshSummary {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(summary_json(Uuid::new_v4(), "sales.csv"))
    }
}

#[tokio::test]
async fn oversize_file_is_rejected_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let policy = FileValidationPolicy {
        max_file_size_bytes: 1024,
        ..FileValidationPolicy::default()
    };
    let orchestrator = UploadOrchestrator::new(client_for(&server), policy);
    let mut events = orchestrator.subscribe();

    let huge = LocalFile::new("huge.csv", "text/csv", vec![b'a'; 2048]);
    assert!(orchestrator.upload_file(huge).await.is_none());

    match events.recv().await.unwrap() {
        UploadEvent::Rejected { filename, errors } => {
            assert_eq!(filename, "huge.csv");
            assert!(errors
                .iter()
                .any(|e| e.code == ValidationErrorCode::FileTooLarge));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(orchestrator.records().is_empty());
}

#[tokio::test]
async fn wrong_extension_is_rejected_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let file = LocalFile::new("malware.exe", "application/octet-stream", vec![0x4d, 0x5a]);

    let errors = orchestrator.validate_file(&file);
    assert!(errors
        .iter()
        .any(|e| e.code == ValidationErrorCode::InvalidFileExtension));
    assert!(orchestrator.upload_file(file).await.is_none());
}

#[tokio::test]
async fn successful_upload_updates_record_and_notifies() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_json(id, "sales.csv")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut events = orchestrator.subscribe();

    let summary = orchestrator.upload_file(sales_csv()).await.unwrap();
    assert_eq!(summary.id, id);
    assert_eq!(summary.status, JobStatus::Uploading);

    let records = orchestrator.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].server_id, Some(id));
    assert_eq!(records[0].status, JobStatus::Uploading);
    assert_eq!(
        events.recv().await.unwrap(),
        UploadEvent::Uploaded {
            filename: "sales.csv".to_string(),
            id
        }
    );
}

#[tokio::test]
async fn server_rejection_marks_record_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(error_json("STORAGE_ERROR", "disk full")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut events = orchestrator.subscribe();

    assert!(orchestrator.upload_file(sales_csv()).await.is_none());

    let records = orchestrator.records();
    assert_eq!(records[0].status, JobStatus::Error);
    assert!(records[0].error.as_deref().unwrap().contains("disk full"));
    assert!(matches!(
        events.recv().await.unwrap(),
        UploadEvent::Failed { .. }
    ));
}

#[tokio::test]
async fn cancel_aborts_in_flight_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(summary_json(Uuid::new_v4(), "sales.csv"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let orchestrator = Arc::new(orchestrator(&server));
    let mut events = orchestrator.subscribe();
    let upload = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.upload_file(sales_csv()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(orchestrator.cancel_upload());
    assert!(upload.await.unwrap().is_none());

    assert_eq!(
        events.recv().await.unwrap(),
        UploadEvent::Cancelled {
            filename: "sales.csv".to_string()
        }
    );
    let records = orchestrator.records();
    assert_eq!(records[0].status, JobStatus::Error);
    assert_eq!(records[0].error.as_deref(), Some("Upload cancelled"));
    assert!(!orchestrator.cancel_upload());
}

#[tokio::test]
async fn cancel_mid_batch_skips_remaining_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(summary_json(Uuid::new_v4(), "sales.csv"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let orchestrator = Arc::new(orchestrator(&server));
    let batch = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .upload_files(vec![sales_csv(), sales_csv(), sales_csv()])
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(orchestrator.cancel_upload());

    let results = batch.await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(Option::is_none));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(orchestrator.records().len(), 1);
}

#[tokio::test]
async fn retry_reenters_validation() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let mut job = helpers::job(id, "sales.csv");
    job.fail("Validation failed: timed out");
    job.reset_for_retry();

    Mock::given(method("POST"))
        .and(path(format!("/api/files/{}/retry", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&job))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let retried = orchestrator.retry_upload(id).await.unwrap();
    assert_eq!(retried.status, JobStatus::Validating);
    assert_eq!(retried.progress, 50);
    assert!(retried.error.is_none());
}

#[tokio::test]
async fn retry_reuploads_retained_bytes_when_server_lost_the_file() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_json(id, "sales.csv")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/files/{}/retry", id)))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_json("NOT_FOUND", "File not found")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/files/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(helpers::job(id, "sales.csv")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    orchestrator.upload_file(sales_csv()).await.unwrap();

    let job = orchestrator.retry_upload(id).await.unwrap();
    assert_eq!(job.id, id);
    assert_eq!(orchestrator.records().len(), 2);
}

#[tokio::test]
async fn retry_without_retained_bytes_reports_failure() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(format!("/api/files/{}/retry", id)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "File not found",
            "code": "NOT_FOUND",
            "recoverable": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut events = orchestrator.subscribe();

    assert!(orchestrator.retry_upload(id).await.is_none());
    match events.recv().await.unwrap() {
        UploadEvent::Failed { message, .. } => assert!(message.contains("no longer available")),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn upload_sends_file_bytes_in_multipart_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .and(body_string_contains("2024-01-01,north,100.5"))
        .and(body_string_contains("filename=\"sales.csv\""))
        .respond_with(FreshSummary)
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    assert!(orchestrator.upload_file(sales_csv()).await.is_some());
}

#[tokio::test]
async fn retained_bytes_stay_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(FreshSummary)
        .expect(5)
        .mount(&server)
        .await;

    let size = sales_csv().size();
    let orchestrator = orchestrator(&server).with_blob_budget(3 * size);

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(orchestrator.upload_file(sales_csv()).await.unwrap().id);
    }

    assert_eq!(orchestrator.retained_bytes(), 3 * size);
    assert!(!orchestrator.is_retained(ids[0]));
    assert!(!orchestrator.is_retained(ids[1]));
    assert!(ids[2..].iter().all(|id| orchestrator.is_retained(*id)));
}

#[tokio::test]
async fn forget_releases_retained_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(FreshSummary)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let id = orchestrator.upload_file(sales_csv()).await.unwrap().id;
    assert_eq!(orchestrator.retained_bytes(), sales_csv().size());

    assert!(orchestrator.forget(id));
    assert!(!orchestrator.forget(id));
    assert_eq!(orchestrator.retained_bytes(), 0);
}

#[tokio::test]
async fn successful_retry_releases_retained_bytes() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let mut job = helpers::job(id, "sales.csv");
    job.reset_for_retry();
    Mock::given(method("POST"))
        .and(path("/api/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_json(id, "sales.csv")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/files/{}/retry", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&job))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    orchestrator.upload_file(sales_csv()).await.unwrap();
    assert!(orchestrator.is_retained(id));

    orchestrator.retry_upload(id).await.unwrap();
    assert!(!orchestrator.is_retained(id));
    assert_eq!(orchestrator.retained_bytes(), 0);
}
