//! Progressive preview loading.
//!
//! [`PreviewLoader::load_preview`] reveals a file in four stages (file info,
//! format recognition, basic statistics, detailed preview), publishing each on
//! a watch channel. Every call takes a fresh generation number and commits
//! state only while that generation is still the newest, so a slow call for an
//! earlier file can never overwrite the state of a later one.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use dlflow_core::models::{FileJob, FileStats, PreviewData, ValidationReport};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{ApiClient, ClientError};

const DEFAULT_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct PreviewLoaderConfig {
    /// Reveal the preview stage by stage; otherwise fetch the full preview at once.
    pub progressive: bool,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
}

impl Default for PreviewLoaderConfig {
    fn default() -> Self {
        Self {
            progressive: true,
            cache_enabled: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPhase {
    FileInfo,
    FormatRecognition,
    BasicStats,
    DetailedPreview,
}

impl PreviewPhase {
    pub fn progress(&self) -> u8 {
        match self {
            PreviewPhase::FileInfo => 25,
            PreviewPhase::FormatRecognition => 50,
            PreviewPhase::BasicStats => 85,
            PreviewPhase::DetailedPreview => 100,
        }
    }
}

/// One step of a progressive load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewStage {
    pub phase: PreviewPhase,
    pub progress: u8,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Encoding, delimiter and compression as detected by server-side validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormatInfo {
    pub file_type: String,
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
    pub compression: Option<String>,
}

impl FormatInfo {
    pub fn from_report(report: &ValidationReport) -> Self {
        Self {
            file_type: report.file_type.clone(),
            encoding: report
                .encoding
                .clone()
                .or_else(|| report.metadata_str("encoding").map(str::to_string)),
            delimiter: report.metadata_str("delimiter").map(str::to_string),
            compression: report.metadata_str("compression").map(str::to_string),
        }
    }
}

/// Everything a finished load reveals. `file` is only fetched in progressive mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewResult {
    pub file_id: Uuid,
    pub file: Option<FileJob>,
    pub format: FormatInfo,
    pub stats: FileStats,
    pub preview: PreviewData,
    pub validation: ValidationReport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewState {
    pub status: LoadStatus,
    pub file_id: Option<Uuid>,
    pub stage: Option<PreviewStage>,
    pub result: Option<PreviewResult>,
    pub error: Option<String>,
}

pub struct PreviewLoader {
    client: ApiClient,
    config: PreviewLoaderConfig,
    cache: Mutex<LruCache<Uuid, PreviewResult>>,
    generation: AtomicU64,
    state: watch::Sender<PreviewState>,
}

/// A later call superseded this one.
struct Superseded;

impl PreviewLoader {
    pub fn new(client: ApiClient, config: PreviewLoaderConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
            state: watch::Sender::new(PreviewState::default()),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Back to `idle`. Any load still running is superseded.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = PreviewState::default();
        });
    }

    /// Load a file's preview. Returns `None` when the load failed (the state
    /// then carries the error) or when a later call superseded this one.
    #[tracing::instrument(skip(self), fields(progressive = self.config.progressive))]
    pub async fn load_preview(&self, file_id: Uuid) -> Option<PreviewResult> {
        let generation = self.begin(file_id);

        if self.config.cache_enabled {
            let cached = self.lock_cache().get(&file_id).cloned();
            if let Some(result) = cached {
                tracing::debug!(file_id = %file_id, "Preview served from cache");
                return self.finish(generation, result);
            }
        }

        let outcome = if self.config.progressive {
            self.load_progressive(generation, file_id).await
        } else {
            self.load_direct(file_id).await.map_err(Ok)
        };

        match outcome {
            Ok(result) => {
                let committed = self.finish(generation, result.clone());
                if committed.is_some() && self.config.cache_enabled {
                    self.lock_cache().put(file_id, result);
                }
                committed
            }
            Err(Ok(e)) => {
                tracing::debug!(file_id = %file_id, error = %e, "Preview load failed");
                self.commit_if_current(generation, |state| {
                    state.status = LoadStatus::Error;
                    state.error = Some(e.to_string());
                });
                None
            }
            Err(Err(Superseded)) => None,
        }
    }

    async fn load_direct(&self, file_id: Uuid) -> Result<PreviewResult, ClientError> {
        let response = self.client.get_preview(file_id).await?;
        Ok(PreviewResult {
            file_id,
            file: None,
            format: FormatInfo::from_report(&response.validation),
            stats: FileStats::from(&response.preview),
            preview: response.preview,
            validation: response.validation,
        })
    }

    /// The four stages. The outer `Err` carries either a client failure or
    /// the fact that a newer call took over.
    async fn load_progressive(
        &self,
        generation: u64,
        file_id: Uuid,
    ) -> Result<PreviewResult, Result<ClientError, Superseded>> {
        let file = self.client.get_file(file_id).await.map_err(Ok)?;
        self.emit(
            generation,
            PreviewPhase::FileInfo,
            format!("Loaded {}", file.original_filename),
            serde_json::to_value(file.summary()).ok(),
        )?;

        let format = file
            .validation_report
            .as_ref()
            .map(FormatInfo::from_report)
            .unwrap_or_else(|| FormatInfo {
                file_type: file.file_type.to_string(),
                ..Default::default()
            });
        self.emit(
            generation,
            PreviewPhase::FormatRecognition,
            format!(
                "Detected {} ({})",
                format.file_type,
                format.encoding.as_deref().unwrap_or("unknown encoding")
            ),
            serde_json::to_value(&format).ok(),
        )?;

        let stats = match self.client.get_stats(file_id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::debug!(file_id = %file_id, error = %e, "Stats endpoint unavailable, using report metadata");
                file.validation_report.as_ref().and_then(FileStats::from_report)
            }
        };
        let stats_message = match &stats {
            Some(s) => format!("{} rows, {} columns", s.total_rows, s.total_columns),
            None => "Statistics not available".to_string(),
        };
        self.emit(
            generation,
            PreviewPhase::BasicStats,
            stats_message,
            stats.as_ref().and_then(|s| serde_json::to_value(s).ok()),
        )?;

        let response = self.client.get_preview(file_id).await.map_err(Ok)?;
        let stats = stats.unwrap_or_else(|| FileStats::from(&response.preview));
        self.emit(
            generation,
            PreviewPhase::DetailedPreview,
            format!("Showing {} rows", response.preview.head.len()),
            None,
        )?;

        Ok(PreviewResult {
            file_id,
            file: Some(file),
            format,
            stats,
            preview: response.preview,
            validation: response.validation,
        })
    }

    /// Enter `loading` for `file_id` under a new generation.
    fn begin(&self, file_id: Uuid) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = PreviewState {
                status: LoadStatus::Loading,
                file_id: Some(file_id),
                ..Default::default()
            };
        });
        generation
    }

    fn emit(
        &self,
        generation: u64,
        phase: PreviewPhase,
        message: String,
        data: Option<serde_json::Value>,
    ) -> Result<(), Result<ClientError, Superseded>> {
        let stage = PreviewStage {
            phase,
            progress: phase.progress(),
            message,
            data,
        };
        if self.commit_if_current(generation, |state| state.stage = Some(stage)) {
            Ok(())
        } else {
            Err(Err(Superseded))
        }
    }

    fn finish(&self, generation: u64, result: PreviewResult) -> Option<PreviewResult> {
        let committed = self.commit_if_current(generation, |state| {
            state.status = LoadStatus::Success;
            state.error = None;
            state.result = Some(result.clone());
        });
        committed.then_some(result)
    }

    /// Apply `update` only if no later load began. The check and the update
    /// happen under the channel's lock, the same lock `begin` takes.
    fn commit_if_current(&self, generation: u64, update: impl FnOnce(&mut PreviewState)) -> bool {
        let mut committed = false;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            committed = true;
            true
        });
        committed
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<Uuid, PreviewResult>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn report() -> ValidationReport {
        let mut metadata = BTreeMap::new();
        metadata.insert("delimiter".to_string(), json!(","));
        metadata.insert("compression".to_string(), json!("none"));
        metadata.insert("num_rows".to_string(), json!(2));
        metadata.insert("num_columns".to_string(), json!(3));
        ValidationReport::from_results(64, "csv", Some("utf-8".to_string()), metadata, vec![])
    }

    #[test]
    fn format_info_reads_report() {
        let format = FormatInfo::from_report(&report());
        assert_eq!(format.file_type, "csv");
        assert_eq!(format.encoding.as_deref(), Some("utf-8"));
        assert_eq!(format.delimiter.as_deref(), Some(","));
        assert_eq!(format.compression.as_deref(), Some("none"));
    }

    #[test]
    fn stale_generation_does_not_commit() {
        let loader = PreviewLoader::new(
            ApiClient::new("http://localhost:1").unwrap(),
            PreviewLoaderConfig::default(),
        );
        let first = loader.begin(Uuid::new_v4());
        let second_id = Uuid::new_v4();
        let second = loader.begin(second_id);

        assert!(!loader.commit_if_current(first, |s| s.status = LoadStatus::Error));
        assert!(loader.commit_if_current(second, |s| s.status = LoadStatus::Success));
        let state = loader.state();
        assert_eq!(state.file_id, Some(second_id));
        assert_eq!(state.status, LoadStatus::Success);
    }

    #[test]
    fn reset_returns_to_idle_and_supersedes() {
        let loader = PreviewLoader::new(
            ApiClient::new("http://localhost:1").unwrap(),
            PreviewLoaderConfig::default(),
        );
        let generation = loader.begin(Uuid::new_v4());
        loader.reset();
        assert_eq!(loader.state(), PreviewState::default());
        assert!(!loader.commit_if_current(generation, |s| s.status = LoadStatus::Success));
    }
}
