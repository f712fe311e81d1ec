// Rule engine - turns one frame of body landmarks into form verdicts
//
// Every check follows the same shape: gate on landmark visibility, compute
// the geometric features, then evaluate each rule independently so that all
// violations are reported together.

use nalgebra::Point2;

use crate::core::geometry::{
    calculate_angle, calculate_distance, calculate_symmetry, check_visibility, midpoint,
    VISIBILITY_THRESHOLD,
};
use crate::models::check::{
    BackPostureMetrics, BicepCurlMetrics, CheckBundle, CheckKind, CheckMetrics, CheckResult,
    ExerciseType, LateralRaiseMetrics, NamedCheck, Side,
};
use crate::models::pose::{BodyLandmark, LandmarkSet};

// Bicep curl thresholds
const CURL_MIN_ELBOW_ANGLE: f64 = 30.0;
const CURL_MAX_ELBOW_ANGLE: f64 = 160.0;
const CURL_MAX_ELBOW_SHOULDER_DISTANCE: f64 = 150.0; // pixels

// Lateral raise thresholds
const RAISE_VERTICAL_TOLERANCE: f64 = 50.0; // pixels
const RAISE_MIN_ARM_ANGLE: f64 = 140.0;
const RAISE_MAX_ARM_ANGLE: f64 = 175.0;
const RAISE_MIN_HORIZONTAL_DISTANCE: f64 = 100.0; // pixels

// Back posture thresholds
const BACK_MAX_HEIGHT_DIFF: f64 = 30.0; // pixels
const BACK_MIN_SPINE_ANGLE: f64 = 160.0;
const BACK_MAX_SPINE_ANGLE: f64 = 200.0;
const BACK_MAX_SYMMETRY: f64 = 0.2;
const SPINE_REFERENCE_OFFSET: f64 = 100.0; // pixels above the shoulder midpoint

/// Collects rule violations for one check
struct Verdict {
    valid: bool,
    feedback: Vec<String>,
}

impl Verdict {
    fn new() -> Self {
        Self {
            valid: true,
            feedback: Vec::new(),
        }
    }

    /// Record a disqualifying violation
    fn fail(&mut self, message: String) {
        self.feedback.push(message);
        self.valid = false;
    }

    /// Record an informational note that leaves validity untouched
    fn note(&mut self, message: String) {
        self.feedback.push(message);
    }

    fn finish(mut self, good_form: String, metrics: CheckMetrics) -> CheckResult {
        if self.feedback.is_empty() {
            self.feedback.push(good_form);
        }

        CheckResult {
            valid: self.valid,
            feedback: self.feedback,
            metrics: Some(metrics),
        }
    }
}

/// Stateless posture checker
#[derive(Debug, Clone, Copy, Default)]
pub struct PostureChecker;

impl PostureChecker {
    pub fn new() -> Self {
        Self
    }

    /// Shoulder/elbow/wrist positions for a side, or `None` if not visible
    fn arm_points(landmarks: Option<&LandmarkSet>, side: Side) -> Option<[Point2<f64>; 3]> {
        let names = side.arm();
        if !check_visibility(landmarks, &names, VISIBILITY_THRESHOLD) {
            return None;
        }

        let landmarks = landmarks?;
        Some([
            landmarks.point(names[0])?,
            landmarks.point(names[1])?,
            landmarks.point(names[2])?,
        ])
    }

    /// Both bounds are exclusive: exactly 30 or 160 degrees passes silently
    fn judge_elbow_angle(verdict: &mut Verdict, label: &str, elbow_angle: f64) {
        if elbow_angle < CURL_MIN_ELBOW_ANGLE {
            verdict.fail(format!("{} arm: Elbow too bent (curl too high)", label));
        } else if elbow_angle > CURL_MAX_ELBOW_ANGLE {
            verdict.note(format!("{} arm: Arm almost straight (lower position)", label));
        }
    }

    pub fn check_bicep_curl(&self, landmarks: Option<&LandmarkSet>, side: Side) -> CheckResult {
        let Some([shoulder, elbow, wrist]) = Self::arm_points(landmarks, side) else {
            return CheckResult::not_visible(&format!("{} arm", side.as_str()));
        };

        let elbow_angle = calculate_angle(&shoulder, &elbow, &wrist);
        let elbow_shoulder_distance = calculate_distance(&elbow, &shoulder);
        let label = side.label();
        let mut verdict = Verdict::new();

        Self::judge_elbow_angle(&mut verdict, label, elbow_angle);

        // y grows downward, so a wrist at or below the elbow has a larger y
        if wrist.y >= elbow.y {
            verdict.fail(format!("{} arm: Lift your wrist higher", label));
        }

        if elbow_shoulder_distance > CURL_MAX_ELBOW_SHOULDER_DISTANCE {
            verdict.fail(format!(
                "{} arm: Keep elbow closer to body (avoid swinging)",
                label
            ));
        }

        verdict.finish(
            format!("{} bicep curl: Good form!", label),
            CheckMetrics::BicepCurl(BicepCurlMetrics {
                elbow_angle,
                elbow_shoulder_distance,
            }),
        )
    }

    pub fn check_lateral_raise(&self, landmarks: Option<&LandmarkSet>, side: Side) -> CheckResult {
        let Some([shoulder, elbow, wrist]) = Self::arm_points(landmarks, side) else {
            return CheckResult::not_visible(&format!("{} arm", side.as_str()));
        };

        let arm_angle = calculate_angle(&shoulder, &elbow, &wrist);
        let wrist_shoulder_vertical_diff = (wrist.y - shoulder.y).abs();
        let horizontal_distance = (wrist.x - shoulder.x).abs();
        let label = side.label();
        let mut verdict = Verdict::new();

        if wrist.y > shoulder.y + RAISE_VERTICAL_TOLERANCE {
            verdict.fail(format!("{} arm: Raise arm higher to shoulder level", label));
        }

        if wrist.y < shoulder.y - RAISE_VERTICAL_TOLERANCE {
            verdict.fail(format!(
                "{} arm: Don't raise wrist above shoulder level",
                label
            ));
        }

        if arm_angle < RAISE_MIN_ARM_ANGLE {
            verdict.fail(format!("{} arm: Straighten your arm more", label));
        } else if arm_angle > RAISE_MAX_ARM_ANGLE {
            verdict.fail(format!(
                "{} arm: Keep elbow slightly bent (don't lock)",
                label
            ));
        }

        if horizontal_distance < RAISE_MIN_HORIZONTAL_DISTANCE {
            verdict.fail(format!("{} arm: Extend arm more to the side", label));
        }

        verdict.finish(
            format!("{} lateral raise: Good form!", label),
            CheckMetrics::LateralRaise(LateralRaiseMetrics {
                arm_angle,
                wrist_shoulder_vertical_diff,
                horizontal_distance,
            }),
        )
    }

    pub fn check_back_posture(&self, landmarks: Option<&LandmarkSet>) -> CheckResult {
        let required = [
            BodyLandmark::LeftShoulder,
            BodyLandmark::RightShoulder,
            BodyLandmark::LeftHip,
            BodyLandmark::RightHip,
        ];
        if !check_visibility(landmarks, &required, VISIBILITY_THRESHOLD) {
            return CheckResult::not_visible("body");
        }

        let points = landmarks.and_then(|set| {
            Some((
                set.point(BodyLandmark::LeftShoulder)?,
                set.point(BodyLandmark::RightShoulder)?,
                set.point(BodyLandmark::LeftHip)?,
                set.point(BodyLandmark::RightHip)?,
            ))
        });
        let Some((left_shoulder, right_shoulder, left_hip, right_hip)) = points else {
            return CheckResult::not_visible("body");
        };

        let shoulder_mid = midpoint(&left_shoulder, &right_shoulder);
        let hip_mid = midpoint(&left_hip, &right_hip);

        let shoulder_height_diff = (left_shoulder.y - right_shoulder.y).abs();
        let hip_height_diff = (left_hip.y - right_hip.y).abs();

        // Angle between straight up and the hip midpoint; 180 is upright
        let above_shoulders = Point2::new(shoulder_mid.x, shoulder_mid.y - SPINE_REFERENCE_OFFSET);
        let spine_angle = calculate_angle(&above_shoulders, &shoulder_mid, &hip_mid);

        let shoulder_symmetry = calculate_symmetry(&left_shoulder, &right_shoulder, &shoulder_mid);
        let hip_symmetry = calculate_symmetry(&left_hip, &right_hip, &hip_mid);

        let mut verdict = Verdict::new();

        if shoulder_height_diff > BACK_MAX_HEIGHT_DIFF {
            verdict.fail("Shoulders are not level - adjust posture".to_string());
        }

        if hip_height_diff > BACK_MAX_HEIGHT_DIFF {
            verdict.fail("Hips are not level - balance your stance".to_string());
        }

        if spine_angle < BACK_MIN_SPINE_ANGLE || spine_angle > BACK_MAX_SPINE_ANGLE {
            verdict.fail("Back is leaning - maintain straight posture".to_string());
        }

        if shoulder_symmetry > BACK_MAX_SYMMETRY || hip_symmetry > BACK_MAX_SYMMETRY {
            verdict.fail("Body is not balanced - center your weight".to_string());
        }

        verdict.finish(
            "Back posture: Good form!".to_string(),
            CheckMetrics::BackPosture(BackPostureMetrics {
                shoulder_height_diff,
                hip_height_diff,
                spine_angle,
                shoulder_symmetry,
                hip_symmetry,
            }),
        )
    }

    /// Evaluate back posture plus the check for the configured exercise
    pub fn check_all(
        &self,
        landmarks: Option<&LandmarkSet>,
        exercise_type: ExerciseType,
        side: Side,
    ) -> CheckBundle {
        let exercise_check = match exercise_type {
            ExerciseType::BicepCurl => self.check_bicep_curl(landmarks, side),
            ExerciseType::LateralRaise => self.check_lateral_raise(landmarks, side),
        };

        CheckBundle::new(
            exercise_type.as_str(),
            vec![
                NamedCheck {
                    kind: CheckKind::BackPosture,
                    result: self.check_back_posture(landmarks),
                },
                NamedCheck {
                    kind: exercise_type.check_kind(),
                    result: exercise_check,
                },
            ],
        )
    }

    /// Like [`check_all`](Self::check_all) but keyed by exercise name.
    /// An unrecognized name only gets the back posture check.
    pub fn check_all_by_name(
        &self,
        landmarks: Option<&LandmarkSet>,
        exercise: &str,
        side: Side,
    ) -> CheckBundle {
        match ExerciseType::from_string(exercise) {
            Ok(exercise_type) => self.check_all(landmarks, exercise_type, side),
            Err(_) => {
                tracing::warn!(exercise, "No exercise-specific check; evaluating back posture only");
                CheckBundle::new(
                    exercise,
                    vec![NamedCheck {
                        kind: CheckKind::BackPosture,
                        result: self.check_back_posture(landmarks),
                    }],
                )
            }
        }
    }
}
