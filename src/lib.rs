pub mod cli;
pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::config::Config;
pub use crate::core::form_detector::{analyze, evaluate_batch, evaluate_frame, finalize_run, FormDetector, StopSignal};
pub use crate::core::posture_checker::PostureChecker;
pub use crate::core::smoothing::smooth_time_series;
pub use crate::core::tracking::{RunStatus, RunTracker, SqliteRunTracker};
pub use crate::models::check::{CheckBundle, CheckResult, ExerciseType, Side};
pub use crate::models::pose::{BodyLandmark, Landmark, LandmarkSet, PoseError, PoseResult};
pub use crate::models::session::{FrameOutcome, FrameRecord, RunSummary};
