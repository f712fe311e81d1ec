// Frame orchestrator - evaluates a stream of poses and assembles the run summary

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::posture_checker::PostureChecker;
use crate::core::smoothing::{smooth_time_series, DEFAULT_POLYORDER, DEFAULT_WINDOW};
use crate::core::tracking::{RunStatus, RunTracker, TrackingResult};
use crate::models::check::{ExerciseType, Side};
use crate::models::pose::{LandmarkSet, PoseError, PoseResult};
use crate::models::session::{FrameOutcome, FrameRecord, RunSummary};

// Frames buffered per worker before a parallel batch is evaluated
const FRAMES_PER_WORKER: usize = 16;

// ==============================================================================
// Stop Signal
// ==============================================================================

/// Cloneable request to stop processing the remaining frames
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==============================================================================
// Frame Evaluation
// ==============================================================================

/// Evaluate one frame. A missing pose yields [`FrameOutcome::NoPose`].
pub fn evaluate_frame(
    landmarks: Option<&LandmarkSet>,
    exercise_type: ExerciseType,
    side: Side,
) -> FrameOutcome {
    match landmarks {
        Some(landmarks) => FrameOutcome::Checked(PostureChecker::new().check_all(
            Some(landmarks),
            exercise_type,
            side,
        )),
        None => FrameOutcome::NoPose,
    }
}

/// Evaluate frames on up to `workers` blocking tasks.
///
/// Outcomes come back in input order regardless of which worker finished first.
pub async fn evaluate_batch(
    frames: Vec<Option<LandmarkSet>>,
    exercise_type: ExerciseType,
    side: Side,
    workers: usize,
) -> PoseResult<Vec<FrameOutcome>> {
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = frames.len().div_ceil(workers.max(1));
    let mut remaining = frames.into_iter();
    let mut tasks = JoinSet::new();
    let mut chunk_index = 0usize;

    loop {
        let chunk: Vec<Option<LandmarkSet>> = remaining.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }

        let index = chunk_index;
        tasks.spawn_blocking(move || {
            let outcomes: Vec<FrameOutcome> = chunk
                .iter()
                .map(|landmarks| evaluate_frame(landmarks.as_ref(), exercise_type, side))
                .collect();
            (index, outcomes)
        });
        chunk_index += 1;
    }

    let mut chunks = Vec::with_capacity(chunk_index);
    while let Some(joined) = tasks.join_next().await {
        chunks.push(joined.map_err(|e| PoseError::WorkerFailed(e.to_string()))?);
    }
    chunks.sort_by_key(|(index, _)| *index);

    Ok(chunks.into_iter().flat_map(|(_, outcomes)| outcomes).collect())
}

/// Smooth every metric series and assemble the final summary
#[allow(clippy::too_many_arguments)]
pub fn finalize_run(
    source: &str,
    exercise_type: ExerciseType,
    side: Side,
    metrics_history: BTreeMap<String, Vec<f64>>,
    frame_results: Vec<FrameRecord>,
    total_frames: u64,
    valid_frames: u64,
    smoothing: (usize, usize),
) -> RunSummary {
    let (window, polyorder) = smoothing;
    let smoothed_metrics = metrics_history
        .into_iter()
        .map(|(key, values)| {
            let smoothed = smooth_time_series(&values, window, polyorder);
            (key, smoothed)
        })
        .collect();

    RunSummary {
        source: source.to_string(),
        exercise_type,
        side,
        total_frames,
        valid_frames,
        accuracy: RunSummary::accuracy_percent(valid_frames, total_frames),
        smoothed_metrics,
        frame_results,
    }
}

// ==============================================================================
// Form Detector
// ==============================================================================

/// Per-run state: frame records, metric history and counters
#[derive(Debug, Clone)]
pub struct FormDetector {
    exercise_type: ExerciseType,
    side: Side,
    smoothing_window: usize,
    smoothing_polyorder: usize,
    metrics_history: BTreeMap<String, Vec<f64>>,
    frame_results: Vec<FrameRecord>,
    frame_count: u64,
    valid_frames: u64,
}

impl FormDetector {
    pub fn new(exercise_type: ExerciseType, side: Side) -> Self {
        Self {
            exercise_type,
            side,
            smoothing_window: DEFAULT_WINDOW,
            smoothing_polyorder: DEFAULT_POLYORDER,
            metrics_history: BTreeMap::new(),
            frame_results: Vec::new(),
            frame_count: 0,
            valid_frames: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.exercise_type, config.side)
            .with_smoothing(config.smoothing_window, config.smoothing_polyorder)
    }

    pub fn with_smoothing(mut self, window: usize, polyorder: usize) -> Self {
        self.smoothing_window = window;
        self.smoothing_polyorder = polyorder;
        self
    }

    pub fn exercise_type(&self) -> ExerciseType {
        self.exercise_type
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn valid_frames(&self) -> u64 {
        self.valid_frames
    }

    pub fn metrics_history(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.metrics_history
    }

    pub fn frame_results(&self) -> &[FrameRecord] {
        &self.frame_results
    }

    /// Evaluate and record the next frame
    pub fn process_landmarks(&mut self, landmarks: Option<&LandmarkSet>) -> &FrameRecord {
        let outcome = evaluate_frame(landmarks, self.exercise_type, self.side);
        self.record_outcome(outcome)
    }

    /// Record an already evaluated frame as the next one in sequence
    pub fn record_outcome(&mut self, outcome: FrameOutcome) -> &FrameRecord {
        self.frame_count += 1;

        if let FrameOutcome::Checked(bundle) = &outcome {
            if bundle.overall_valid {
                self.valid_frames += 1;
            }
            for (key, value) in bundle.metric_entries() {
                self.metrics_history.entry(key).or_default().push(value);
            }
        }

        self.frame_results.push(FrameRecord::new(self.frame_count, outcome));
        &self.frame_results[self.frame_results.len() - 1]
    }

    pub fn finalize(self, source: &str) -> RunSummary {
        finalize_run(
            source,
            self.exercise_type,
            self.side,
            self.metrics_history,
            self.frame_results,
            self.frame_count,
            self.valid_frames,
            (self.smoothing_window, self.smoothing_polyorder),
        )
    }
}

// ==============================================================================
// Run Driver
// ==============================================================================

fn log_progress(frame_count: u64, interval: u64, total_hint: Option<u64>) {
    if interval == 0 || frame_count % interval != 0 {
        return;
    }

    match total_hint {
        Some(total) => info!("Processed {}/{} frames...", frame_count, total),
        None => info!("Processed {} frames...", frame_count),
    }
}

fn report_tracking(result: TrackingResult<()>, action: &str) {
    if let Err(e) = result {
        warn!("Run tracking failed to {}: {}", action, e);
    }
}

async fn flush_batch(
    detector: &mut FormDetector,
    pending: &mut Vec<Option<LandmarkSet>>,
    workers: usize,
    interval: u64,
    total_hint: Option<u64>,
) -> PoseResult<()> {
    let frames = std::mem::take(pending);
    let outcomes = evaluate_batch(frames, detector.exercise_type, detector.side, workers).await?;

    for outcome in outcomes {
        detector.record_outcome(outcome);
        log_progress(detector.frame_count, interval, total_hint);
    }

    Ok(())
}

async fn run_frames<I>(
    detector: &mut FormDetector,
    poses: I,
    config: &Config,
    stop: &StopSignal,
    total_hint: Option<u64>,
) -> PoseResult<()>
where
    I: IntoIterator<Item = PoseResult<Option<LandmarkSet>>>,
{
    let interval = config.progress_interval;
    let workers = config.parallel_workers.max(1);
    let mut pending = Vec::new();

    for pose in poses {
        if stop.is_stop_requested() {
            info!("Stop requested; finishing with frames processed so far");
            break;
        }

        let landmarks = pose?;

        if workers == 1 {
            detector.process_landmarks(landmarks.as_ref());
            log_progress(detector.frame_count, interval, total_hint);
            continue;
        }

        pending.push(landmarks);
        if pending.len() >= workers * FRAMES_PER_WORKER {
            flush_batch(detector, &mut pending, workers, interval, total_hint).await?;
        }
    }

    if !pending.is_empty() {
        flush_batch(detector, &mut pending, workers, interval, total_hint).await?;
    }

    Ok(())
}

/// Analyze a stream of per-frame poses.
///
/// `poses` yields one item per frame; `Ok(None)` is a frame without a
/// detected pose. A failing item aborts the run with no summary. When a
/// tracker is given, run parameters and summary metrics are reported to it,
/// and tracker failures are only logged.
pub async fn analyze<I>(
    source: &str,
    poses: I,
    config: &Config,
    tracker: Option<&dyn RunTracker>,
    stop: &StopSignal,
    total_hint: Option<u64>,
) -> PoseResult<RunSummary>
where
    I: IntoIterator<Item = PoseResult<Option<LandmarkSet>>>,
{
    info!(
        source,
        exercise = %config.exercise_type,
        side = %config.side,
        workers = config.parallel_workers,
        "Starting analysis"
    );

    let tracker = match tracker {
        Some(tracker) => match tracker.start_run(source).await {
            Ok(run_id) => {
                debug!(run_id = %run_id, "Tracking run started");
                Some(tracker)
            }
            Err(e) => {
                warn!("Run tracking disabled for this run: {}", e);
                None
            }
        },
        None => None,
    };

    if let Some(tracker) = tracker {
        report_tracking(tracker.log_param("source", source).await, "log source");
        report_tracking(
            tracker
                .log_param("exercise_type", config.exercise_type.as_str())
                .await,
            "log exercise type",
        );
        report_tracking(
            tracker.log_param("side", config.side.as_str()).await,
            "log side",
        );
        if let Some(total) = total_hint {
            report_tracking(
                tracker.log_param("total_frames", &total.to_string()).await,
                "log total frames",
            );
        }
    }

    let mut detector = FormDetector::from_config(config);
    if let Err(e) = run_frames(&mut detector, poses, config, stop, total_hint).await {
        if let Some(tracker) = tracker {
            report_tracking(tracker.end_run(RunStatus::Failed).await, "end run");
        }
        return Err(e);
    }

    let summary = detector.finalize(source);

    if let Some(tracker) = tracker {
        log_summary_metrics(tracker, &summary).await;
        report_tracking(tracker.end_run(RunStatus::Finished).await, "end run");
    }

    info!(
        total_frames = summary.total_frames,
        valid_frames = summary.valid_frames,
        accuracy = summary.accuracy,
        "Analysis complete"
    );

    Ok(summary)
}

async fn log_summary_metrics(tracker: &dyn RunTracker, summary: &RunSummary) {
    let totals = [
        ("total_frames_processed", summary.total_frames as f64),
        ("valid_frames", summary.valid_frames as f64),
        ("accuracy_percent", summary.accuracy),
    ];
    for (key, value) in totals {
        report_tracking(tracker.log_metric(key, value).await, "log metric");
    }

    for (key, stats) in summary.metric_statistics() {
        report_tracking(
            tracker.log_metric(&format!("avg_{}", key), stats.mean).await,
            "log metric",
        );
        report_tracking(
            tracker.log_metric(&format!("std_{}", key), stats.std_dev).await,
            "log metric",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracking::TrackingError;
    use crate::models::pose::{BodyLandmark, Landmark};
    use crate::models::session::NO_POSE_FEEDBACK;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn visible(x: f64, y: f64) -> Landmark {
        Landmark::new(x, y, 0.0, 0.99)
    }

    /// Upright torso with a left arm mid-curl; passes every bicep curl check
    fn good_curl_frame() -> LandmarkSet {
        LandmarkSet::new()
            .with(BodyLandmark::LeftShoulder, visible(250.0, 100.0))
            .with(BodyLandmark::RightShoulder, visible(150.0, 100.0))
            .with(BodyLandmark::LeftHip, visible(240.0, 300.0))
            .with(BodyLandmark::RightHip, visible(160.0, 300.0))
            .with(BodyLandmark::LeftElbow, visible(250.0, 150.0))
            .with(BodyLandmark::LeftWrist, visible(310.0, 120.0))
    }

    /// Same torso with the wrist hanging below the elbow
    fn bad_curl_frame() -> LandmarkSet {
        good_curl_frame().with(BodyLandmark::LeftWrist, visible(250.0, 200.0))
    }

    #[derive(Default)]
    struct RecordingTracker {
        events: Mutex<Vec<String>>,
        metrics: Mutex<Vec<(String, f64)>>,
    }

    #[async_trait]
    impl RunTracker for RecordingTracker {
        async fn start_run(&self, run_name: &str) -> TrackingResult<String> {
            self.events.lock().unwrap().push(format!("start:{}", run_name));
            Ok("run-1".to_string())
        }

        async fn log_param(&self, key: &str, value: &str) -> TrackingResult<()> {
            self.events.lock().unwrap().push(format!("param:{}={}", key, value));
            Ok(())
        }

        async fn log_metric(&self, key: &str, value: f64) -> TrackingResult<()> {
            self.metrics.lock().unwrap().push((key.to_string(), value));
            Ok(())
        }

        async fn end_run(&self, status: RunStatus) -> TrackingResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("end:{}", status.as_str()));
            Ok(())
        }
    }

    struct UnavailableTracker;

    #[async_trait]
    impl RunTracker for UnavailableTracker {
        async fn start_run(&self, _run_name: &str) -> TrackingResult<String> {
            Err(TrackingError::NoActiveRun)
        }

        async fn log_param(&self, _key: &str, _value: &str) -> TrackingResult<()> {
            Err(TrackingError::NoActiveRun)
        }

        async fn log_metric(&self, _key: &str, _value: f64) -> TrackingResult<()> {
            Err(TrackingError::NoActiveRun)
        }

        async fn end_run(&self, _status: RunStatus) -> TrackingResult<()> {
            Err(TrackingError::NoActiveRun)
        }
    }

    #[test]
    fn test_evaluate_frame_without_pose() {
        let outcome = evaluate_frame(None, ExerciseType::BicepCurl, Side::Left);
        assert_eq!(outcome, FrameOutcome::NoPose);
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_detector_records_metrics_by_key() {
        let mut detector = FormDetector::new(ExerciseType::BicepCurl, Side::Left);

        let record = detector.process_landmarks(Some(&good_curl_frame()));
        assert_eq!(record.frame, 1);
        assert!(record.valid);

        detector.process_landmarks(None);
        let record = detector.process_landmarks(Some(&bad_curl_frame()));
        assert_eq!(record.frame, 3);
        assert!(!record.valid);

        assert_eq!(detector.frame_count(), 3);
        assert_eq!(detector.valid_frames(), 1);

        let keys: Vec<&String> = detector.metrics_history().keys().collect();
        assert_eq!(
            keys,
            vec![
                "back_posture_hip_height_diff",
                "back_posture_hip_symmetry",
                "back_posture_shoulder_height_diff",
                "back_posture_shoulder_symmetry",
                "back_posture_spine_angle",
                "bicep_curl_elbow_angle",
                "bicep_curl_elbow_shoulder_distance",
            ]
        );
        // The no-pose frame adds nothing to the history
        assert!(detector.metrics_history().values().all(|series| series.len() == 2));
        assert_eq!(
            detector.frame_results()[1].feedback,
            vec![NO_POSE_FEEDBACK.to_string()]
        );
    }

    #[test]
    fn test_visibility_failure_adds_no_metrics() {
        let mut detector = FormDetector::new(ExerciseType::LateralRaise, Side::Right);
        detector.process_landmarks(Some(&good_curl_frame()));

        assert_eq!(detector.valid_frames(), 0);
        assert!(detector
            .metrics_history()
            .keys()
            .all(|key| key.starts_with("back_posture_")));
    }

    #[test]
    fn test_finalize_smooths_each_series() {
        let mut detector = FormDetector::new(ExerciseType::BicepCurl, Side::Left);
        for _ in 0..6 {
            detector.process_landmarks(Some(&good_curl_frame()));
        }
        let summary = detector.finalize("clip");

        assert_eq!(summary.total_frames, 6);
        assert_eq!(summary.valid_frames, 6);
        assert_eq!(summary.accuracy, 100.0);
        let distances = &summary.smoothed_metrics["bicep_curl_elbow_shoulder_distance"];
        assert_eq!(distances.len(), 6);
        for value in distances {
            approx::assert_abs_diff_eq!(*value, 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_finalize_run_of_empty_history() {
        let summary = finalize_run(
            "empty",
            ExerciseType::BicepCurl,
            Side::Right,
            BTreeMap::new(),
            Vec::new(),
            0,
            0,
            (5, 2),
        );

        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.smoothed_metrics.is_empty());
        assert!(summary.frame_results.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_any_pose() {
        let poses = (0..12).map(|_| Ok(None));

        let summary = analyze("blank", poses, &Config::default(), None, &StopSignal::new(), Some(12))
            .await
            .unwrap();

        assert_eq!(summary.total_frames, 12);
        assert_eq!(summary.valid_frames, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.smoothed_metrics.is_empty());
        assert_eq!(summary.frame_results.len(), 12);
        assert!(summary
            .frame_results
            .iter()
            .all(|record| record.feedback == vec![NO_POSE_FEEDBACK.to_string()]));
    }

    #[tokio::test]
    async fn test_analyze_propagates_source_errors() {
        let poses = vec![
            Ok(Some(good_curl_frame())),
            Err(PoseError::InferenceFailed("detector crashed".to_string())),
            Ok(None),
        ];
        let tracker = RecordingTracker::default();

        let result = analyze(
            "broken",
            poses,
            &Config::default(),
            Some(&tracker),
            &StopSignal::new(),
            None,
        )
        .await;

        assert!(matches!(result, Err(PoseError::InferenceFailed(_))));
        // The run is closed, and marked failed
        assert_eq!(tracker.events.lock().unwrap().last().unwrap(), "end:failed");
        assert!(tracker.metrics.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_signal_yields_partial_summary() {
        let stop = StopSignal::new();
        let trigger = stop.clone();
        let poses = (0..10).map(move |i| {
            if i == 4 {
                trigger.request_stop();
            }
            Ok(Some(good_curl_frame()))
        });

        let summary = analyze("partial", poses, &Config::default(), None, &stop, Some(10))
            .await
            .unwrap();

        // The frame produced alongside the stop request is discarded
        assert_eq!(summary.total_frames, 4);
        assert_eq!(summary.valid_frames, 4);
        assert_eq!(summary.frame_results.len(), 4);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let frames: Vec<Option<LandmarkSet>> = (0..75)
            .map(|i| match i % 3 {
                0 => Some(good_curl_frame()),
                1 => Some(bad_curl_frame()),
                _ => None,
            })
            .collect();

        let sequential = analyze(
            "clip",
            frames.clone().into_iter().map(Ok),
            &Config::default(),
            None,
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        let mut config = Config::default();
        config.parallel_workers = 4;
        let parallel = analyze(
            "clip",
            frames.into_iter().map(Ok),
            &config,
            None,
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.valid_frames, 25);
        assert_eq!(parallel.frame_results[2].feedback, vec![NO_POSE_FEEDBACK.to_string()]);
    }

    #[tokio::test]
    async fn test_evaluate_batch_keeps_order() {
        let frames = vec![None, Some(good_curl_frame()), None, Some(bad_curl_frame()), None];

        let outcomes = evaluate_batch(frames, ExerciseType::BicepCurl, Side::Left, 3)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[0], FrameOutcome::NoPose);
        assert!(outcomes[1].is_valid());
        assert_eq!(outcomes[2], FrameOutcome::NoPose);
        assert!(!outcomes[3].is_valid());
        assert_eq!(outcomes[4], FrameOutcome::NoPose);

        assert!(evaluate_batch(Vec::new(), ExerciseType::BicepCurl, Side::Left, 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_tracker_receives_params_and_metrics() {
        let tracker = RecordingTracker::default();
        let poses = vec![Ok(Some(good_curl_frame())), Ok(Some(bad_curl_frame())), Ok(None)];

        let summary = analyze(
            "curl.jsonl",
            poses,
            &Config::default(),
            Some(&tracker),
            &StopSignal::new(),
            Some(3),
        )
        .await
        .unwrap();

        let events = tracker.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:curl.jsonl",
                "param:source=curl.jsonl",
                "param:exercise_type=bicep_curl",
                "param:side=left",
                "param:total_frames=3",
                "end:finished",
            ]
        );

        let metrics = tracker.metrics.lock().unwrap().clone();
        assert_eq!(metrics[0], ("total_frames_processed".to_string(), 3.0));
        assert_eq!(metrics[1], ("valid_frames".to_string(), 1.0));
        approx::assert_relative_eq!(metrics[2].1, summary.accuracy);

        // Two smoothed values per series, mean and std-dev for each of the seven series
        assert_eq!(metrics.len(), 3 + 2 * 7);
        let distance = metrics
            .iter()
            .find(|(key, _)| key == "avg_bicep_curl_elbow_shoulder_distance")
            .unwrap();
        approx::assert_relative_eq!(distance.1, 50.0);
        assert!(metrics
            .iter()
            .any(|(key, _)| key == "std_back_posture_spine_angle"));
    }

    #[tokio::test]
    async fn test_tracker_failures_do_not_abort() {
        let poses = vec![Ok(Some(good_curl_frame())), Ok(None)];

        let summary = analyze(
            "clip",
            poses,
            &Config::default(),
            Some(&UnavailableTracker),
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.valid_frames, 1);
    }
}
