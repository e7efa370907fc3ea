//! Shared fixtures for client tests against a wiremock server.

use dlflow_api_client::ApiClient;
use dlflow_core::models::{
    FileJob, FileType, PreviewData, PreviewSummary, ValidationReport, ValidationResult,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;
use wiremock::MockServer;

pub fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri()).unwrap()
}

pub fn job(id: Uuid, filename: &str) -> FileJob {
    FileJob::new(id, filename, FileType::Csv, 64, "text/csv", None, None)
}

pub fn summary_json(id: Uuid, filename: &str) -> Value {
    serde_json::to_value(job(id, filename).summary()).unwrap()
}

pub fn report() -> ValidationReport {
    let mut metadata = BTreeMap::new();
    metadata.insert("encoding".to_string(), json!("utf-8"));
    metadata.insert("delimiter".to_string(), json!(","));
    metadata.insert("compression".to_string(), json!("none"));
    metadata.insert("num_rows".to_string(), json!(2));
    metadata.insert("num_columns".to_string(), json!(3));
    metadata.insert(
        "dtypes".to_string(),
        json!({"date": "object", "region": "object", "revenue": "float64"}),
    );
    ValidationReport::from_results(
        64,
        "csv",
        Some("utf-8".to_string()),
        metadata,
        vec![ValidationResult::info(
            "DATETIME_COLUMN_DETECTED",
            "Column 'date' looks like a datetime",
        )],
    )
}

pub fn preview() -> PreviewData {
    let columns = vec!["date".to_string(), "region".to_string(), "revenue".to_string()];
    let dtypes: BTreeMap<String, String> = [
        ("date", "object"),
        ("region", "object"),
        ("revenue", "float64"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let row = |date: &str, region: &str, revenue: f64| {
        let mut map = serde_json::Map::new();
        map.insert("date".to_string(), json!(date));
        map.insert("region".to_string(), json!(region));
        map.insert("revenue".to_string(), json!(revenue));
        map
    };
    PreviewData {
        columns: columns.clone(),
        dtypes,
        shape: [2, 3],
        head: vec![
            row("2024-01-01", "north", 100.5),
            row("2024-01-02", "south", 98.0),
        ],
        summary: PreviewSummary {
            total_rows: 2,
            total_columns: 3,
            null_counts: columns.into_iter().map(|c| (c, 0)).collect(),
            memory_usage: 176,
        },
    }
}

/// A finished job with report and preview.
pub fn finished_job_json(id: Uuid) -> Value {
    let mut job = job(id, "sales.csv");
    job.accept(report()).unwrap();
    job.succeed(Some(preview()), None).unwrap();
    serde_json::to_value(job).unwrap()
}

pub fn preview_response_json() -> Value {
    json!({
        "preview": preview(),
        "validation": report(),
    })
}

pub fn error_json(code: &str, message: &str) -> Value {
    json!({
        "error": message,
        "code": code,
        "recoverable": false,
    })
}
