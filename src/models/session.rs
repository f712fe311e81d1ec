// Data models for per-frame records and run summaries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::check::{CheckBundle, ExerciseType, Side};
use super::pose::PoseResult;

pub const NO_POSE_FEEDBACK: &str = "No pose detected";

// ==============================================================================
// Frame Records
// ==============================================================================

/// Outcome of evaluating one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "results", rename_all = "snake_case")]
pub enum FrameOutcome {
    NoPose,
    Checked(CheckBundle),
}

impl FrameOutcome {
    pub fn is_valid(&self) -> bool {
        match self {
            FrameOutcome::NoPose => false,
            FrameOutcome::Checked(bundle) => bundle.overall_valid,
        }
    }

    pub fn feedback(&self) -> Vec<String> {
        match self {
            FrameOutcome::NoPose => vec![NO_POSE_FEEDBACK.to_string()],
            FrameOutcome::Checked(bundle) => bundle.all_feedback.clone(),
        }
    }

    pub fn bundle(&self) -> Option<&CheckBundle> {
        match self {
            FrameOutcome::NoPose => None,
            FrameOutcome::Checked(bundle) => Some(bundle),
        }
    }
}

/// Snapshot of one processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64, // 1-based
    pub valid: bool,
    pub feedback: Vec<String>,
    pub outcome: FrameOutcome,
}

impl FrameRecord {
    pub fn new(frame: u64, outcome: FrameOutcome) -> Self {
        Self {
            frame,
            valid: outcome.is_valid(),
            feedback: outcome.feedback(),
            outcome,
        }
    }
}

// ==============================================================================
// Run Summary
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std_dev: f64, // Population standard deviation
}

impl MetricStats {
    /// Mean and population standard deviation; `None` for an empty series
    pub fn from_series(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

/// Final result of analyzing one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: String,
    pub exercise_type: ExerciseType,
    pub side: Side,
    pub total_frames: u64,
    pub valid_frames: u64,
    pub accuracy: f64, // Percent of processed frames with valid form
    pub smoothed_metrics: BTreeMap<String, Vec<f64>>,
    pub frame_results: Vec<FrameRecord>,
}

impl RunSummary {
    pub fn accuracy_percent(valid_frames: u64, total_frames: u64) -> f64 {
        if total_frames == 0 {
            return 0.0;
        }
        valid_frames as f64 / total_frames as f64 * 100.0
    }

    /// Mean/std-dev of every non-empty smoothed series
    pub fn metric_statistics(&self) -> BTreeMap<String, MetricStats> {
        self.smoothed_metrics
            .iter()
            .filter_map(|(key, values)| MetricStats::from_series(values).map(|s| (key.clone(), s)))
            .collect()
    }

    /// Write the summary as pretty JSON, creating parent directories
    pub fn save_json(&self, path: &Path) -> PoseResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }
}
