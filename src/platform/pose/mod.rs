// Pose estimation platform integration
// Provides the MediaPipe bridge, landmark recordings and the detection stream

pub mod mediapipe_bridge;
pub mod recording;

pub use mediapipe_bridge::{DefaultPoseBackend, DummyPoseBackend, PoseBackend};
pub use recording::{LandmarkRecorder, LandmarkRecording};

use crate::models::capture::{CaptureResult, VideoFrame};
use crate::models::pose::{LandmarkSet, PoseResult};

/// Runs a pose backend over a stream of frames, optionally recording
/// every detection for later replay
pub struct DetectedPoses<'a, F, B: ?Sized> {
    frames: F,
    backend: &'a B,
    recorder: Option<LandmarkRecorder>,
}

impl<'a, F, B> DetectedPoses<'a, F, B>
where
    F: Iterator<Item = CaptureResult<VideoFrame>>,
    B: PoseBackend + ?Sized,
{
    pub fn new(frames: F, backend: &'a B) -> Self {
        Self {
            frames,
            backend,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: LandmarkRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Flush the recorder, if any, and return the number of recorded frames
    pub fn finish(self) -> PoseResult<Option<u64>> {
        self.recorder.map(LandmarkRecorder::finish).transpose()
    }
}

impl<F, B> Iterator for DetectedPoses<'_, F, B>
where
    F: Iterator<Item = CaptureResult<VideoFrame>>,
    B: PoseBackend + ?Sized,
{
    type Item = PoseResult<Option<LandmarkSet>>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = match self.frames.next()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e.into())),
        };

        let detected = match self.backend.detect(&frame) {
            Ok(detected) => detected,
            Err(e) => return Some(Err(e)),
        };

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(detected.as_ref()) {
                return Some(Err(e));
            }
        }

        Some(Ok(detected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::{CaptureError, PixelFormat};
    use crate::models::pose::{BodyLandmark, Landmark, PoseConfig, PoseError};
    use std::path::PathBuf;

    /// Finds a pose in odd-numbered frames only
    struct OddFrameBackend;

    impl PoseBackend for OddFrameBackend {
        fn new(_config: &PoseConfig) -> PoseResult<Self> {
            Ok(Self)
        }

        fn detect(&self, frame: &VideoFrame) -> PoseResult<Option<LandmarkSet>> {
            if frame.index % 2 == 1 {
                Ok(Some(LandmarkSet::new().with(
                    BodyLandmark::Nose,
                    Landmark::new(frame.width as f64 / 2.0, 10.0, 0.0, 1.0),
                )))
            } else {
                Ok(None)
            }
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> String {
            "odd frames".to_string()
        }
    }

    fn frames(count: u64) -> impl Iterator<Item = CaptureResult<VideoFrame>> {
        (1..=count).map(|index| {
            Ok(VideoFrame {
                index,
                width: 64,
                height: 48,
                data: vec![0; 64 * 48 * 3],
                format: PixelFormat::RGB8,
            })
        })
    }

    #[test]
    fn test_detection_stream_with_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detected.jsonl");
        let backend = OddFrameBackend::new(&PoseConfig::default()).unwrap();

        let mut poses = DetectedPoses::new(frames(3), &backend)
            .with_recorder(LandmarkRecorder::create(&path).unwrap());
        let detected: Vec<Option<LandmarkSet>> =
            poses.by_ref().collect::<PoseResult<_>>().unwrap();
        assert_eq!(poses.finish().unwrap(), Some(3));

        assert_eq!(detected.len(), 3);
        assert!(detected[0].is_some());
        assert!(detected[1].is_none());
        assert_eq!(detected[2].as_ref().unwrap().point(BodyLandmark::Nose).unwrap().x, 32.0);

        let replayed: Vec<Option<LandmarkSet>> = LandmarkRecording::open(&path)
            .unwrap()
            .collect::<PoseResult<_>>()
            .unwrap();
        assert_eq!(replayed, detected);
    }

    #[test]
    fn test_capture_errors_surface() {
        let backend = OddFrameBackend;
        let failing = std::iter::once(Err(CaptureError::NoFrames(PathBuf::from("clip"))));

        let mut poses = DetectedPoses::new(failing, &backend);
        assert!(matches!(
            poses.next(),
            Some(Err(PoseError::Capture(CaptureError::NoFrames(_))))
        ));
        assert!(poses.next().is_none());
        assert_eq!(poses.finish().unwrap(), None);
    }
}
