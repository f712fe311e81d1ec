// Run tracking - records run parameters and result metrics for later comparison

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::database::Database;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No active run")]
    NoActiveRun,

    #[error("A run is already active: {0}")]
    RunAlreadyActive(String),
}

pub type TrackingResult<T> = Result<T, TrackingError>;

/// Terminal state recorded when a run is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        }
    }
}

/// Experiment-tracking capability used by the analysis runner.
///
/// Implementations only observe a run; they never influence its results.
#[async_trait]
pub trait RunTracker: Send + Sync {
    /// Open a run and return its id
    async fn start_run(&self, run_name: &str) -> TrackingResult<String>;

    async fn log_param(&self, key: &str, value: &str) -> TrackingResult<()>;

    async fn log_metric(&self, key: &str, value: f64) -> TrackingResult<()>;

    /// Close the active run with its terminal status
    async fn end_run(&self, status: RunStatus) -> TrackingResult<()>;
}

// ==============================================================================
// Database Models
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunRecord {
    pub id: String,
    pub run_name: String,
    pub status: String,
    pub start_timestamp: i64,
    pub end_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunParamRecord {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunMetricRecord {
    pub key: String,
    pub value: f64,
    pub timestamp: i64,
}

// ==============================================================================
// SQLite Tracker
// ==============================================================================

pub struct SqliteRunTracker {
    db: Arc<Database>,
    current_run_id: Arc<RwLock<Option<String>>>,
}

impl SqliteRunTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            current_run_id: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn current_run(&self) -> Option<String> {
        self.current_run_id.read().await.clone()
    }

    async fn active_run(&self) -> TrackingResult<String> {
        self.current_run_id
            .read()
            .await
            .clone()
            .ok_or(TrackingError::NoActiveRun)
    }

    /// Most recent runs first
    pub async fn list_runs(&self, limit: i64) -> TrackingResult<Vec<RunRecord>> {
        let runs = sqlx::query_as::<_, RunRecord>(
            "SELECT id, run_name, status, start_timestamp, end_timestamp
             FROM runs ORDER BY start_timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(runs)
    }

    pub async fn get_run(&self, run_id: &str) -> TrackingResult<Option<RunRecord>> {
        let run = sqlx::query_as::<_, RunRecord>(
            "SELECT id, run_name, status, start_timestamp, end_timestamp FROM runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(run)
    }

    pub async fn get_params(&self, run_id: &str) -> TrackingResult<Vec<RunParamRecord>> {
        let params = sqlx::query_as::<_, RunParamRecord>(
            "SELECT key, value FROM run_params WHERE run_id = ? ORDER BY key ASC",
        )
        .bind(run_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(params)
    }

    pub async fn get_metrics(&self, run_id: &str) -> TrackingResult<Vec<RunMetricRecord>> {
        let metrics = sqlx::query_as::<_, RunMetricRecord>(
            "SELECT key, value, timestamp FROM run_metrics WHERE run_id = ? ORDER BY id ASC",
        )
        .bind(run_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(metrics)
    }
}

#[async_trait]
impl RunTracker for SqliteRunTracker {
    async fn start_run(&self, run_name: &str) -> TrackingResult<String> {
        let mut current = self.current_run_id.write().await;
        if let Some(active) = current.as_ref() {
            return Err(TrackingError::RunAlreadyActive(active.clone()));
        }

        let run_id = Uuid::new_v4().to_string();
        let start_timestamp = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO runs (id, run_name, status, start_timestamp, end_timestamp)
             VALUES (?, ?, 'running', ?, NULL)",
        )
        .bind(&run_id)
        .bind(run_name)
        .bind(start_timestamp)
        .execute(self.db.pool())
        .await?;

        *current = Some(run_id.clone());
        Ok(run_id)
    }

    async fn log_param(&self, key: &str, value: &str) -> TrackingResult<()> {
        let run_id = self.active_run().await?;

        sqlx::query(
            "INSERT INTO run_params (run_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT(run_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(&run_id)
        .bind(key)
        .bind(value)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn log_metric(&self, key: &str, value: f64) -> TrackingResult<()> {
        let run_id = self.active_run().await?;
        let timestamp = chrono::Utc::now().timestamp_millis();

        sqlx::query("INSERT INTO run_metrics (run_id, key, value, timestamp) VALUES (?, ?, ?, ?)")
            .bind(&run_id)
            .bind(key)
            .bind(value)
            .bind(timestamp)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    async fn end_run(&self, status: RunStatus) -> TrackingResult<()> {
        let mut current = self.current_run_id.write().await;
        let run_id = current.take().ok_or(TrackingError::NoActiveRun)?;
        let end_timestamp = chrono::Utc::now().timestamp_millis();

        sqlx::query("UPDATE runs SET status = ?, end_timestamp = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(end_timestamp)
            .bind(&run_id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_tracker() -> SqliteRunTracker {
        let db = Database::in_memory()
            .await
            .expect("Failed to create in-memory database");
        SqliteRunTracker::new(Arc::new(db))
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let tracker = setup_tracker().await;

        let run_id = tracker.start_run("curl.jsonl").await.expect("Failed to start run");
        assert_eq!(tracker.current_run().await, Some(run_id.clone()));

        tracker.log_param("exercise_type", "bicep_curl").await.unwrap();
        tracker.log_param("side", "left").await.unwrap();
        tracker.log_param("side", "right").await.unwrap();
        tracker.log_metric("accuracy_percent", 87.5).await.unwrap();
        tracker.log_metric("valid_frames", 7.0).await.unwrap();
        tracker.end_run(RunStatus::Finished).await.expect("Failed to end run");

        assert_eq!(tracker.current_run().await, None);

        let run = tracker.get_run(&run_id).await.unwrap().expect("Run not found");
        assert_eq!(run.run_name, "curl.jsonl");
        assert_eq!(run.status, "finished");
        assert!(run.end_timestamp.is_some());

        let params = tracker.get_params(&run_id).await.unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].key, "side");
        assert_eq!(params[1].value, "right");

        let metrics = tracker.get_metrics(&run_id).await.unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].key, "accuracy_percent");
        assert_eq!(metrics[0].value, 87.5);
    }

    #[tokio::test]
    async fn test_logging_without_run_fails() {
        let tracker = setup_tracker().await;

        assert!(matches!(
            tracker.log_metric("accuracy_percent", 1.0).await,
            Err(TrackingError::NoActiveRun)
        ));
        assert!(matches!(
            tracker.end_run(RunStatus::Finished).await,
            Err(TrackingError::NoActiveRun)
        ));
    }

    #[tokio::test]
    async fn test_single_active_run() {
        let tracker = setup_tracker().await;

        tracker.start_run("first").await.unwrap();
        assert!(matches!(
            tracker.start_run("second").await,
            Err(TrackingError::RunAlreadyActive(_))
        ));
    }

    #[tokio::test]
    async fn test_list_runs() {
        let tracker = setup_tracker().await;

        for i in 0..3 {
            tracker.start_run(&format!("run-{}", i)).await.unwrap();
            tracker.end_run(RunStatus::Finished).await.unwrap();
        }

        let runs = tracker.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].run_name, "run-2");

        assert_eq!(tracker.list_runs(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_failed_status() {
        let tracker = setup_tracker().await;

        let failed = tracker.start_run("broken.jsonl").await.unwrap();
        tracker.end_run(RunStatus::Failed).await.unwrap();
        let finished = tracker.start_run("good.jsonl").await.unwrap();
        tracker.end_run(RunStatus::Finished).await.unwrap();

        let run = tracker.get_run(&failed).await.unwrap().expect("Run not found");
        assert_eq!(run.status, "failed");
        assert!(run.end_timestamp.is_some());

        let run = tracker.get_run(&finished).await.unwrap().expect("Run not found");
        assert_eq!(run.status, "finished");
    }
}
