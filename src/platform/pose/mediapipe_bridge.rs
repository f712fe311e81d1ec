// MediaPipe integration bridge
// Abstracts the pose detector that turns a decoded frame into body landmarks
// Real inference runs through PyO3 (Python MediaPipe); the dummy backend never detects

use crate::models::capture::{PixelFormat, VideoFrame};
use crate::models::pose::{LandmarkSet, PoseConfig, PoseResult};

/// Pose backend trait
/// Implement this for any detector that can produce the 33 named body landmarks
pub trait PoseBackend: Send + Sync {
    /// Initialize the detector
    fn new(config: &PoseConfig) -> PoseResult<Self>
    where
        Self: Sized;

    /// Detect a pose; `None` when no person is found.
    /// Coordinates come back scaled to the frame's pixel dimensions.
    fn detect(&self, frame: &VideoFrame) -> PoseResult<Option<LandmarkSet>>;

    /// Check if models are loaded
    fn is_initialized(&self) -> bool;

    /// Get model info
    fn get_model_info(&self) -> String;
}

/// Tightly packed RGB bytes for a frame, dropping alpha if present
pub fn rgb_bytes(frame: &VideoFrame) -> Vec<u8> {
    match frame.format {
        PixelFormat::RGB8 => frame.data.clone(),
        PixelFormat::RGBA8 => frame
            .data
            .chunks_exact(frame.bytes_per_pixel())
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    }
}

// ==============================================================================
// PyO3 Implementation (Python MediaPipe)
// ==============================================================================

#[cfg(feature = "ml-pyo3")]
pub mod pyo3_backend {
    use super::*;
    use crate::models::pose::{NormalizedKeypoint, PoseError};
    use pyo3::prelude::*;
    use pyo3::types::{PyBytes, PyDict};

    const INFERENCE_MODULE: &str = r#"
import json

import mediapipe as mp
import numpy as np

_pose = None


def init(static_image_mode, model_complexity, min_detection_confidence, min_tracking_confidence):
    global _pose
    _pose = mp.solutions.pose.Pose(
        static_image_mode=static_image_mode,
        model_complexity=model_complexity,
        min_detection_confidence=min_detection_confidence,
        min_tracking_confidence=min_tracking_confidence,
    )


def process_rgb_bytes(image_bytes, width, height):
    frame = np.frombuffer(image_bytes, dtype=np.uint8).reshape((height, width, 3))
    results = _pose.process(frame)
    if results.pose_landmarks is None:
        return "null"
    return json.dumps([
        {"x": lm.x, "y": lm.y, "z": lm.z, "visibility": lm.visibility}
        for lm in results.pose_landmarks.landmark
    ])
"#;

    pub struct PyO3MediaPipe {
        // Python inference module
        inference_module: Py<PyModule>,
        config: PoseConfig,
    }

    impl PoseBackend for PyO3MediaPipe {
        fn new(config: &PoseConfig) -> PoseResult<Self> {
            Python::with_gil(|py| {
                let module = PyModule::from_code_bound(
                    py,
                    INFERENCE_MODULE,
                    "form_check_inference.py",
                    "form_check_inference",
                )
                .map_err(|e| {
                    PoseError::ModelLoadFailed(format!(
                        "Failed to load MediaPipe: {}. Make sure mediapipe and numpy are installed",
                        e
                    ))
                })?;

                module
                    .getattr("init")
                    .and_then(|init| {
                        init.call1((
                            config.static_image_mode,
                            config.model_complexity as u8,
                            config.min_detection_confidence,
                            config.min_tracking_confidence,
                        ))
                    })
                    .map_err(|e| PoseError::ModelLoadFailed(format!("Failed to create pose model: {}", e)))?;

                tracing::info!(
                    model_complexity = ?config.model_complexity,
                    static_image_mode = config.static_image_mode,
                    "PyO3 MediaPipe pose backend initialized"
                );

                Ok(Self {
                    inference_module: module.unbind(),
                    config: config.clone(),
                })
            })
        }

        fn detect(&self, frame: &VideoFrame) -> PoseResult<Option<LandmarkSet>> {
            let pixels = rgb_bytes(frame);

            let json_str: String = Python::with_gil(|py| {
                let module = self.inference_module.bind(py);

                let process_fn = module
                    .getattr("process_rgb_bytes")
                    .map_err(|e| PoseError::InferenceFailed(format!("Failed to get process_rgb_bytes: {}", e)))?;

                let kwargs = PyDict::new_bound(py);
                kwargs
                    .set_item("image_bytes", PyBytes::new_bound(py, &pixels))
                    .and_then(|_| kwargs.set_item("width", frame.width))
                    .and_then(|_| kwargs.set_item("height", frame.height))
                    .map_err(|e| PoseError::InferenceFailed(format!("Failed to build arguments: {}", e)))?;

                process_fn
                    .call((), Some(&kwargs))
                    .and_then(|result| result.extract::<String>())
                    .map_err(|e| PoseError::InferenceFailed(format!("MediaPipe inference failed: {}", e)))
            })?;

            let keypoints: Option<Vec<NormalizedKeypoint>> = serde_json::from_str(&json_str)
                .map_err(|e| PoseError::InferenceFailed(format!("Failed to parse JSON: {}", e)))?;

            Ok(keypoints.map(|kps| LandmarkSet::from_normalized(&kps, frame.width, frame.height)))
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> String {
            format!(
                "PyO3 MediaPipe Pose (Python backend) - complexity: {:?}, detection confidence: {}",
                self.config.model_complexity, self.config.min_detection_confidence
            )
        }
    }
}

// ==============================================================================
// Dummy Implementation (for builds without inference)
// ==============================================================================

pub struct DummyPoseBackend {
    config: PoseConfig,
}

impl PoseBackend for DummyPoseBackend {
    fn new(config: &PoseConfig) -> PoseResult<Self> {
        tracing::warn!("Using dummy pose backend (no inference); every frame will report no pose");
        tracing::warn!("Enable the 'ml-pyo3' feature for MediaPipe inference");
        Ok(Self {
            config: config.clone(),
        })
    }

    fn detect(&self, _frame: &VideoFrame) -> PoseResult<Option<LandmarkSet>> {
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn get_model_info(&self) -> String {
        format!(
            "Dummy pose backend (no ML inference - enable 'ml-pyo3' feature), complexity: {:?}",
            self.config.model_complexity
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

#[cfg(feature = "ml-pyo3")]
pub type DefaultPoseBackend = pyo3_backend::PyO3MediaPipe;

#[cfg(not(feature = "ml-pyo3"))]
pub type DefaultPoseBackend = DummyPoseBackend;

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(format: PixelFormat, data: Vec<u8>) -> VideoFrame {
        VideoFrame {
            index: 1,
            width: 2,
            height: 1,
            data,
            format,
        }
    }

    #[test]
    fn test_dummy_backend_never_detects() {
        let backend = DummyPoseBackend::new(&PoseConfig::default()).unwrap();
        assert!(!backend.is_initialized());
        assert!(backend.get_model_info().contains("Dummy"));

        let detected = backend
            .detect(&frame(PixelFormat::RGB8, vec![0; 6]))
            .unwrap();
        assert!(detected.is_none());
    }

    #[test]
    fn test_rgb_bytes_drops_alpha() {
        let rgba = frame(PixelFormat::RGBA8, vec![1, 2, 3, 255, 4, 5, 6, 128]);
        assert_eq!(rgb_bytes(&rgba), vec![1, 2, 3, 4, 5, 6]);

        let rgb = frame(PixelFormat::RGB8, vec![9, 8, 7, 6, 5, 4]);
        assert_eq!(rgb_bytes(&rgb), vec![9, 8, 7, 6, 5, 4]);
    }
}
