//! File ingestion API integration tests.
//!
//! Run with: `cargo test -p dlflow-api --test files_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use dlflow_api::ErrorResponse;
use helpers::{api_path, fixtures, setup_test_app, setup_test_app_with, ScriptedValidator};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_upload_returns_uploading_then_succeeds_with_preview() {
    let app = setup_test_app().await;

    let response = app.upload("sales.csv", &fixtures::sales_csv()).await;
    assert_eq!(response.status_code(), 200);
    let summary = response.json::<Value>();
    assert_eq!(summary["status"], "uploading");
    assert_eq!(summary["original_filename"], "sales.csv");
    assert_eq!(summary["file_type"], "csv");
    assert_eq!(summary["file_size"], fixtures::SALES_CSV.len() as u64);

    let id = summary["id"].as_str().unwrap().to_string();
    let job = app.wait_until_settled(&id).await;
    assert_eq!(job["status"], "success");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["validation_report"]["is_valid"], true);
    let columns = job["preview_data"]["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(job["preview_data"]["shape"][0], 2);

    assert!(app.uploads_dir().join(format!("{}.csv", id)).exists());
}

#[tokio::test]
async fn test_preview_and_stats_after_success() {
    let app = setup_test_app().await;
    let summary = app
        .upload("sales.csv", &fixtures::sales_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();
    app.wait_until_settled(&id).await;

    let preview = app
        .client()
        .get(&api_path(&format!("/files/{}/preview", id)))
        .await;
    assert_eq!(preview.status_code(), 200);
    let body = preview.json::<Value>();
    assert_eq!(body["validation"]["is_valid"], true);
    assert_eq!(body["preview"]["head"].as_array().unwrap().len(), 2);

    let stats = app
        .client()
        .get(&api_path(&format!("/files/{}/stats", id)))
        .await;
    assert_eq!(stats.status_code(), 200);
    let stats = stats.json::<Value>();
    assert_eq!(stats["total_rows"], 2);
    assert_eq!(stats["total_columns"], 3);
    assert!(stats["dtypes"].get("revenue").is_some());
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path(&format!("/files/{}", Uuid::new_v4())))
        .await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.json::<ErrorResponse>().code, "NOT_FOUND");

    let response = app.client().get(&api_path("/files/not-a-uuid")).await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_invalid_file_ends_in_error_without_preview() {
    let app = setup_test_app().await;
    let summary = app
        .upload("broken.csv", &fixtures::ragged_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();

    let job = app.wait_until_settled(&id).await;
    assert_eq!(job["status"], "error");
    assert_eq!(job["progress"], 0);
    assert_eq!(job["validation_report"]["is_valid"], false);
    assert!(job["error"].as_str().unwrap().contains("CSV_PARSE_ERROR"));
    assert!(job.get("preview_data").map_or(true, Value::is_null));

    let preview = app
        .client()
        .get(&api_path(&format!("/files/{}/preview", id)))
        .await;
    assert_eq!(preview.status_code(), 400);
}

#[tokio::test]
async fn test_rejected_extension_creates_no_job() {
    let app = setup_test_app().await;

    let response = app.upload("malware.exe", b"MZ\x90\x00").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<ErrorResponse>().code,
        "INVALID_FILE_EXTENSION"
    );

    let list = app.client().get(&api_path("/files")).await.json::<Value>();
    assert!(list["files"].as_array().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(app.uploads_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_uncommon_csv_mime_labels_are_accepted() {
    let app = setup_test_app().await;

    for mime_type in ["application/csv", "text/x-csv", "text/comma-separated-values"] {
        let response = app
            .upload_as("sales.csv", mime_type, &fixtures::sales_csv())
            .await;
        assert_eq!(response.status_code(), 200, "{}", mime_type);
        let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

        let job = app.wait_until_settled(&id).await;
        assert_eq!(job["status"], "success");
        assert_eq!(job["mime_type"], mime_type);
    }
}

#[tokio::test]
async fn test_oversize_upload_is_rejected() {
    let app = setup_test_app_with(|config| config.max_file_size_bytes = 1024, None).await;

    let big = "a,b\n".repeat(1024).into_bytes();
    let response = app.upload("huge.csv", &big).await;
    assert_eq!(response.status_code(), 413);
    assert_eq!(response.json::<ErrorResponse>().code, "FILE_TOO_LARGE");

    let list = app.client().get(&api_path("/files")).await.json::<Value>();
    assert!(list["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file_field_is_invalid_input() {
    let app = setup_test_app().await;
    let form = MultipartForm::new().add_text("description", "no file here");
    let response = app.upload_form(form).await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_project_scoped_upload() {
    let app = setup_test_app().await;

    let missing = MultipartForm::new()
        .add_text("project_id", Uuid::new_v4().to_string())
        .add_part(
            "file",
            Part::bytes(fixtures::sales_csv())
                .file_name("sales.csv")
                .mime_type("text/csv"),
        );
    assert_eq!(app.upload_form(missing).await.status_code(), 404);

    let project_id = Uuid::new_v4();
    std::fs::create_dir_all(&app.config.projects_dir).unwrap();
    std::fs::write(
        app.config.projects_dir.join(format!("{}.json", project_id)),
        r#"{"name": "sales"}"#,
    )
    .unwrap();

    let form = MultipartForm::new()
        .add_text("project_id", project_id.to_string())
        .add_text("description", "Q1 sales")
        .add_part(
            "file",
            Part::bytes(fixtures::sales_csv())
                .file_name("sales.csv")
                .mime_type("text/csv"),
        );
    let response = app.upload_form(form).await;
    assert_eq!(response.status_code(), 200);
    let summary = response.json::<Value>();
    assert_eq!(summary["project_id"], project_id.to_string());

    let job = app.get_job(summary["id"].as_str().unwrap()).await;
    assert_eq!(job["description"], "Q1 sales");

    let filtered = app
        .client()
        .get(&api_path(&format!("/files?project_id={}", project_id)))
        .await
        .json::<Value>();
    assert_eq!(filtered["files"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_filters_and_paging() {
    let app = setup_test_app().await;
    for _ in 0..2 {
        let summary = app
            .upload("sales.csv", &fixtures::sales_csv())
            .await
            .json::<Value>();
        app.wait_until_settled(summary["id"].as_str().unwrap()).await;
    }

    let all = app.client().get(&api_path("/files")).await.json::<Value>();
    assert_eq!(all["files"].as_array().unwrap().len(), 2);

    let page = app
        .client()
        .get(&api_path("/files?limit=1"))
        .await
        .json::<Value>();
    assert_eq!(page["files"].as_array().unwrap().len(), 1);

    let errors = app
        .client()
        .get(&api_path("/files?status=error"))
        .await
        .json::<Value>();
    assert!(errors["files"].as_array().unwrap().is_empty());

    let parquet = app
        .client()
        .get(&api_path("/files?file_type=parquet"))
        .await
        .json::<Value>();
    assert!(parquet["files"].as_array().unwrap().is_empty());

    let bad = app.client().get(&api_path("/files?limit=many")).await;
    assert_eq!(bad.status_code(), 400);
}

#[tokio::test]
async fn test_retry_reenters_validation_and_rejects_overlap() {
    let validator = ScriptedValidator::new(false);
    let app = setup_test_app_with(|_| {}, Some(validator.clone())).await;

    let summary = app
        .upload("sales.csv", &fixtures::sales_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();
    let failed = app.wait_until_settled(&id).await;
    assert_eq!(failed["status"], "error");

    validator.set_valid(true);
    validator.set_delay(Duration::from_millis(300));

    let retry_path = api_path(&format!("/files/{}/retry", id));
    let response = app.client().post(&retry_path).await;
    assert_eq!(response.status_code(), 200);
    let job = response.json::<Value>();
    assert_eq!(job["status"], "validating");
    assert_eq!(job["progress"], 50);
    assert!(job.get("error").map_or(true, Value::is_null));
    assert!(job.get("validation_report").map_or(true, Value::is_null));
    assert_eq!(job["attempt"], 2);

    let overlap = app.client().post(&retry_path).await;
    assert_eq!(overlap.status_code(), 409);

    let settled = app.wait_until_settled(&id).await;
    assert_eq!(settled["status"], "success");
    assert_eq!(settled["validation_report"]["is_valid"], true);
}

#[tokio::test]
async fn test_preview_not_ready_while_validating() {
    let validator = ScriptedValidator::new(true);
    validator.set_delay(Duration::from_millis(300));
    let app = setup_test_app_with(|_| {}, Some(validator)).await;

    let summary = app
        .upload("sales.csv", &fixtures::sales_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();

    let preview = app
        .client()
        .get(&api_path(&format!("/files/{}/preview", id)))
        .await;
    assert_eq!(preview.status_code(), 400);

    app.wait_until_settled(&id).await;
}

#[tokio::test]
async fn test_delete_removes_bytes_and_record() {
    let app = setup_test_app().await;
    let summary = app
        .upload("sales.csv", &fixtures::sales_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();
    app.wait_until_settled(&id).await;

    let response = app
        .client()
        .delete(&api_path(&format!("/files/{}", id)))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["id"], id);

    let gone = app
        .client()
        .get(&api_path(&format!("/files/{}", id)))
        .await;
    assert_eq!(gone.status_code(), 404);
    assert!(!app.uploads_dir().join(format!("{}.csv", id)).exists());

    let again = app
        .client()
        .delete(&api_path(&format!("/files/{}", id)))
        .await;
    assert_eq!(again.status_code(), 404);
}

#[tokio::test]
async fn test_retry_after_bytes_are_gone_is_not_found() {
    let validator = ScriptedValidator::new(false);
    let app = setup_test_app_with(|_| {}, Some(validator)).await;
    let summary = app
        .upload("sales.csv", &fixtures::sales_csv())
        .await
        .json::<Value>();
    let id = summary["id"].as_str().unwrap().to_string();
    app.wait_until_settled(&id).await;

    std::fs::remove_file(app.uploads_dir().join(format!("{}.csv", id))).unwrap();

    let response = app
        .client()
        .post(&api_path(&format!("/files/{}/retry", id)))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_health_check() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ingest_queue"], "healthy");

    app.state.ingest.queue.shutdown();
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 503);
}
