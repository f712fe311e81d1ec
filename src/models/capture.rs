// Data structures for frames read from a video source

use std::path::PathBuf;

/// A decoded frame handed to the pose backend
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub index: u64, // 1-based position in the source
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl VideoFrame {
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }
}

/// Pixel format of decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGB8,
    RGBA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGB8 => 3,
            PixelFormat::RGBA8 => 4,
        }
    }
}

/// Error types for frame source operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Could not decode frame {path}: {message}")]
    DecodeFailed { path: PathBuf, message: String },

    #[error("No frames found in {0}")]
    NoFrames(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
