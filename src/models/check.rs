// Data models for posture check verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

use super::pose::{BodyLandmark, PoseError, PoseResult};

// ==============================================================================
// Exercise and Side Selection
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    BicepCurl,
    LateralRaise,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::BicepCurl => "bicep_curl",
            ExerciseType::LateralRaise => "lateral_raise",
        }
    }

    pub fn from_string(s: &str) -> PoseResult<Self> {
        match s.to_lowercase().as_str() {
            "bicep_curl" => Ok(ExerciseType::BicepCurl),
            "lateral_raise" => Ok(ExerciseType::LateralRaise),
            _ => Err(PoseError::UnsupportedExercise(s.to_string())),
        }
    }

    /// The exercise-specific check that runs for this exercise
    pub fn check_kind(&self) -> CheckKind {
        match self {
            ExerciseType::BicepCurl => CheckKind::BicepCurl,
            ExerciseType::LateralRaise => CheckKind::LateralRaise,
        }
    }

    /// Human readable title, e.g. "Bicep Curl"
    pub fn title(&self) -> &'static str {
        match self {
            ExerciseType::BicepCurl => "Bicep Curl",
            ExerciseType::LateralRaise => "Lateral Raise",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn from_string(s: &str) -> PoseResult<Self> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            _ => Err(PoseError::InvalidSide(s.to_string())),
        }
    }

    /// Capitalized form used at the start of feedback messages
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    /// Shoulder, elbow and wrist of this side
    pub fn arm(&self) -> [BodyLandmark; 3] {
        match self {
            Side::Left => [
                BodyLandmark::LeftShoulder,
                BodyLandmark::LeftElbow,
                BodyLandmark::LeftWrist,
            ],
            Side::Right => [
                BodyLandmark::RightShoulder,
                BodyLandmark::RightElbow,
                BodyLandmark::RightWrist,
            ],
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==============================================================================
// Check Results
// ==============================================================================

/// Named rule checks; the name prefixes metric keys in the run history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    BackPosture,
    BicepCurl,
    LateralRaise,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::BackPosture => "back_posture",
            CheckKind::BicepCurl => "bicep_curl",
            CheckKind::LateralRaise => "lateral_raise",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BicepCurlMetrics {
    pub elbow_angle: f64,
    pub elbow_shoulder_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateralRaiseMetrics {
    pub arm_angle: f64,
    pub wrist_shoulder_vertical_diff: f64,
    pub horizontal_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackPostureMetrics {
    pub shoulder_height_diff: f64,
    pub hip_height_diff: f64,
    pub spine_angle: f64,
    pub shoulder_symmetry: f64,
    pub hip_symmetry: f64,
}

/// Measurements taken by one check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckMetrics {
    BicepCurl(BicepCurlMetrics),
    LateralRaise(LateralRaiseMetrics),
    BackPosture(BackPostureMetrics),
}

impl CheckMetrics {
    /// Metric name/value pairs in a fixed order
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        match self {
            CheckMetrics::BicepCurl(m) => vec![
                ("elbow_angle", m.elbow_angle),
                ("elbow_shoulder_distance", m.elbow_shoulder_distance),
            ],
            CheckMetrics::LateralRaise(m) => vec![
                ("arm_angle", m.arm_angle),
                ("wrist_shoulder_vertical_diff", m.wrist_shoulder_vertical_diff),
                ("horizontal_distance", m.horizontal_distance),
            ],
            CheckMetrics::BackPosture(m) => vec![
                ("shoulder_height_diff", m.shoulder_height_diff),
                ("hip_height_diff", m.hip_height_diff),
                ("spine_angle", m.spine_angle),
                ("shoulder_symmetry", m.shoulder_symmetry),
                ("hip_symmetry", m.hip_symmetry),
            ],
        }
    }
}

/// Verdict of a single rule check.
///
/// `metrics` is `None` exactly when the required landmarks were not visible
/// and no geometry was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub valid: bool,
    pub feedback: Vec<String>,
    pub metrics: Option<CheckMetrics>,
}

impl CheckResult {
    /// Result for a check whose landmarks could not be seen
    pub fn not_visible(region: &str) -> Self {
        Self {
            valid: false,
            feedback: vec![format!("Cannot detect {} landmarks clearly", region)],
            metrics: None,
        }
    }

    pub fn is_visibility_failure(&self) -> bool {
        self.metrics.is_none()
    }

    pub fn metric_values(&self) -> Vec<(&'static str, f64)> {
        self.metrics.map(|m| m.values()).unwrap_or_default()
    }
}

/// A check result tagged with the check that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCheck {
    pub kind: CheckKind,
    pub result: CheckResult,
}

/// All checks evaluated for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckBundle {
    pub exercise: String,
    pub checks: Vec<NamedCheck>,
    pub overall_valid: bool,
    pub all_feedback: Vec<String>,
}

impl CheckBundle {
    /// Combine check results; validity and feedback follow insertion order
    pub fn new(exercise: impl Into<String>, checks: Vec<NamedCheck>) -> Self {
        let overall_valid = checks.iter().all(|c| c.result.valid);
        let all_feedback = checks
            .iter()
            .flat_map(|c| c.result.feedback.iter().cloned())
            .collect();

        Self {
            exercise: exercise.into(),
            checks,
            overall_valid,
            all_feedback,
        }
    }

    pub fn get(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.kind == kind).map(|c| &c.result)
    }

    /// `(metric key, value)` pairs where the key is `<check>_<metric>`
    pub fn metric_entries(&self) -> Vec<(String, f64)> {
        self.checks
            .iter()
            .flat_map(|check| {
                check
                    .result
                    .metric_values()
                    .into_iter()
                    .map(move |(name, value)| (format!("{}_{}", check.kind.as_str(), name), value))
            })
            .collect()
    }
}
