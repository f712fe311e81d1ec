// Data models for body pose landmarks and pose backend configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use nalgebra::Point2;

// ==============================================================================
// Body Landmarks (33 keypoints)
// ==============================================================================

/// MediaPipe Pose landmark vocabulary (33 total), in detector output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub const COUNT: usize = 33;

    /// All landmarks in detector index order
    pub const ALL: [BodyLandmark; 33] = [
        BodyLandmark::Nose,
        BodyLandmark::LeftEyeInner,
        BodyLandmark::LeftEye,
        BodyLandmark::LeftEyeOuter,
        BodyLandmark::RightEyeInner,
        BodyLandmark::RightEye,
        BodyLandmark::RightEyeOuter,
        BodyLandmark::LeftEar,
        BodyLandmark::RightEar,
        BodyLandmark::MouthLeft,
        BodyLandmark::MouthRight,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
        BodyLandmark::LeftElbow,
        BodyLandmark::RightElbow,
        BodyLandmark::LeftWrist,
        BodyLandmark::RightWrist,
        BodyLandmark::LeftPinky,
        BodyLandmark::RightPinky,
        BodyLandmark::LeftIndex,
        BodyLandmark::RightIndex,
        BodyLandmark::LeftThumb,
        BodyLandmark::RightThumb,
        BodyLandmark::LeftHip,
        BodyLandmark::RightHip,
        BodyLandmark::LeftKnee,
        BodyLandmark::RightKnee,
        BodyLandmark::LeftAnkle,
        BodyLandmark::RightAnkle,
        BodyLandmark::LeftHeel,
        BodyLandmark::RightHeel,
        BodyLandmark::LeftFootIndex,
        BodyLandmark::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyLandmark::Nose => "nose",
            BodyLandmark::LeftEyeInner => "left_eye_inner",
            BodyLandmark::LeftEye => "left_eye",
            BodyLandmark::LeftEyeOuter => "left_eye_outer",
            BodyLandmark::RightEyeInner => "right_eye_inner",
            BodyLandmark::RightEye => "right_eye",
            BodyLandmark::RightEyeOuter => "right_eye_outer",
            BodyLandmark::LeftEar => "left_ear",
            BodyLandmark::RightEar => "right_ear",
            BodyLandmark::MouthLeft => "mouth_left",
            BodyLandmark::MouthRight => "mouth_right",
            BodyLandmark::LeftShoulder => "left_shoulder",
            BodyLandmark::RightShoulder => "right_shoulder",
            BodyLandmark::LeftElbow => "left_elbow",
            BodyLandmark::RightElbow => "right_elbow",
            BodyLandmark::LeftWrist => "left_wrist",
            BodyLandmark::RightWrist => "right_wrist",
            BodyLandmark::LeftPinky => "left_pinky",
            BodyLandmark::RightPinky => "right_pinky",
            BodyLandmark::LeftIndex => "left_index",
            BodyLandmark::RightIndex => "right_index",
            BodyLandmark::LeftThumb => "left_thumb",
            BodyLandmark::RightThumb => "right_thumb",
            BodyLandmark::LeftHip => "left_hip",
            BodyLandmark::RightHip => "right_hip",
            BodyLandmark::LeftKnee => "left_knee",
            BodyLandmark::RightKnee => "right_knee",
            BodyLandmark::LeftAnkle => "left_ankle",
            BodyLandmark::RightAnkle => "right_ankle",
            BodyLandmark::LeftHeel => "left_heel",
            BodyLandmark::RightHeel => "right_heel",
            BodyLandmark::LeftFootIndex => "left_foot_index",
            BodyLandmark::RightFootIndex => "right_foot_index",
        }
    }

    pub fn from_string(s: &str) -> PoseResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|landmark| landmark.as_str() == s)
            .ok_or_else(|| PoseError::UnknownLandmark(s.to_string()))
    }
}

impl fmt::Display for BodyLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==============================================================================
// Landmark
// ==============================================================================

/// A single body keypoint in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,          // Pixels, scaled to frame width
    pub y: f64,          // Pixels, scaled to frame height (grows downward)
    pub z: f64,          // Depth relative to the hip midpoint, unitless
    pub visibility: f64, // Detection confidence [0, 1]
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility >= threshold
    }

    /// Position in the image plane; depth is ignored
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// A detector keypoint before pixel scaling (x and y normalized to [0, 1])
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedKeypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

// ==============================================================================
// Landmark Set
// ==============================================================================

/// Every landmark detected in one frame, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, Landmark>",
    into = "HashMap<String, Landmark>"
)]
pub struct LandmarkSet {
    landmarks: HashMap<BodyLandmark, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from detector output ordered by landmark index.
    /// Normalized coordinates are scaled to pixels; extra indices are dropped.
    pub fn from_normalized(keypoints: &[NormalizedKeypoint], width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let landmarks = keypoints
            .iter()
            .enumerate()
            .filter_map(|(idx, kp)| {
                BodyLandmark::from_index(idx)
                    .map(|name| (name, Landmark::new(kp.x * w, kp.y * h, kp.z, kp.visibility)))
            })
            .collect();

        Self { landmarks }
    }

    pub fn insert(&mut self, name: BodyLandmark, landmark: Landmark) -> Option<Landmark> {
        self.landmarks.insert(name, landmark)
    }

    pub fn with(mut self, name: BodyLandmark, landmark: Landmark) -> Self {
        self.landmarks.insert(name, landmark);
        self
    }

    pub fn get(&self, name: BodyLandmark) -> Option<&Landmark> {
        self.landmarks.get(&name)
    }

    /// Pixel-plane coordinates of a named landmark
    pub fn point(&self, name: BodyLandmark) -> Option<Point2<f64>> {
        self.get(name).map(Landmark::point)
    }

    pub fn contains(&self, name: BodyLandmark) -> bool {
        self.landmarks.contains_key(&name)
    }

    /// True when all 33 canonical names are present
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() == BodyLandmark::COUNT
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BodyLandmark, &Landmark)> {
        self.landmarks.iter()
    }
}

impl TryFrom<HashMap<String, Landmark>> for LandmarkSet {
    type Error = PoseError;

    fn try_from(named: HashMap<String, Landmark>) -> Result<Self, Self::Error> {
        let mut landmarks = HashMap::with_capacity(named.len());
        for (name, landmark) in named {
            landmarks.insert(BodyLandmark::from_string(&name)?, landmark);
        }
        Ok(Self { landmarks })
    }
}

impl From<LandmarkSet> for HashMap<String, Landmark> {
    fn from(set: LandmarkSet) -> Self {
        set.landmarks
            .into_iter()
            .map(|(name, landmark)| (name.as_str().to_string(), landmark))
            .collect()
    }
}

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    pub static_image_mode: bool,           // Treat every frame as unrelated (default: false)
    pub model_complexity: ModelComplexity, // Model complexity (0=lite, 1=full, 2=heavy)
    pub min_detection_confidence: f32,     // Minimum confidence for detection (default: 0.5)
    pub min_tracking_confidence: f32,      // Minimum confidence for tracking (default: 0.5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite = 0,  // Fastest, less accurate
    Full = 1,  // Balanced
    Heavy = 2, // Slowest, most accurate
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            static_image_mode: false,
            model_complexity: ModelComplexity::Full,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Unsupported exercise type: {0}. Must be one of: bicep_curl, lateral_raise")]
    UnsupportedExercise(String),

    #[error("Invalid side: {0}. Must be one of: left, right")]
    InvalidSide(String),

    #[error("Unknown landmark name: {0}")]
    UnknownLandmark(String),

    #[error("Landmark recording error at line {line}: {message}")]
    Recording { line: usize, message: String },

    #[error("Evaluation worker failed: {0}")]
    WorkerFailed(String),

    #[error("Frame capture failed: {0}")]
    Capture(#[from] crate::models::capture::CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_visibility() {
        let landmark = Landmark::new(10.0, 20.0, 0.0, 0.8);
        assert!(landmark.is_visible(0.5));
        assert!(landmark.is_visible(0.8));
        assert!(!landmark.is_visible(0.9));
    }

    #[test]
    fn test_landmark_names_round_trip_through_index() {
        for (idx, landmark) in BodyLandmark::ALL.iter().enumerate() {
            assert_eq!(landmark.index(), idx);
            assert_eq!(BodyLandmark::from_string(landmark.as_str()).unwrap(), *landmark);
        }
        assert_eq!(BodyLandmark::from_index(33), None);
        assert!(BodyLandmark::from_string("left_antenna").is_err());
    }

    #[test]
    fn test_from_normalized_scales_to_pixels() {
        let keypoints: Vec<NormalizedKeypoint> = (0..35)
            .map(|_| NormalizedKeypoint {
                x: 0.5,
                y: 0.25,
                z: -0.1,
                visibility: 0.9,
            })
            .collect();

        let set = LandmarkSet::from_normalized(&keypoints, 640, 480);

        assert!(set.is_complete());
        let shoulder = set.get(BodyLandmark::LeftShoulder).unwrap();
        assert_eq!(shoulder.x, 320.0);
        assert_eq!(shoulder.y, 120.0);
        assert_eq!(shoulder.z, -0.1);
        assert_eq!(shoulder.visibility, 0.9);
    }

    #[test]
    fn test_landmark_set_json_uses_names() {
        let set = LandmarkSet::new().with(BodyLandmark::RightWrist, Landmark::new(1.0, 2.0, 0.0, 1.0));

        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"right_wrist\""));

        let parsed: LandmarkSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);

        let bad = r#"{"third_arm": {"x": 0.0, "y": 0.0, "z": 0.0, "visibility": 1.0}}"#;
        assert!(serde_json::from_str::<LandmarkSet>(bad).is_err());
    }

    #[test]
    fn test_pose_config_default() {
        let config = PoseConfig::default();
        assert!(!config.static_image_mode);
        assert_eq!(config.model_complexity, ModelComplexity::Full);
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.min_tracking_confidence, 0.5);
    }
}
