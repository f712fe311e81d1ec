// Frame source over still images on disk
//
// A directory is read as one frame per image file, ordered by file name.
// A single image file is a one-frame sequence.

use std::path::{Path, PathBuf};

use crate::models::capture::{CaptureError, CaptureResult, PixelFormat, VideoFrame};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn open(source: &Path) -> CaptureResult<Self> {
        if !source.exists() {
            return Err(CaptureError::SourceNotFound(source.to_path_buf()));
        }

        let mut paths = if source.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(source)? {
                let path = entry?.path();
                if path.is_file() && is_image(&path) {
                    paths.push(path);
                }
            }
            paths
        } else if is_image(source) {
            vec![source.to_path_buf()]
        } else {
            Vec::new()
        };

        if paths.is_empty() {
            return Err(CaptureError::NoFrames(source.to_path_buf()));
        }
        paths.sort();

        tracing::debug!(frames = paths.len(), source = %source.display(), "Opened image sequence");

        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Decode one image into an RGB frame
    pub fn read_frame(path: &Path, index: u64) -> CaptureResult<VideoFrame> {
        let image = image::open(path)
            .map_err(|e| CaptureError::DecodeFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .to_rgb8();

        Ok(VideoFrame {
            index,
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
            format: PixelFormat::RGB8,
        })
    }
}

impl Iterator for ImageSequence {
    type Item = CaptureResult<VideoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?;
        self.next += 1;
        Some(Self::read_frame(path, self.next as u64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paths.len() - self.next;
        (remaining, Some(remaining))
    }
}
