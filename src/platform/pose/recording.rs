// JSON-lines landmark recordings
//
// One line per frame: either a JSON object mapping landmark names to
// landmarks, or `null` for a frame where no pose was detected.
// Blank lines are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::models::capture::CaptureError;
use crate::models::pose::{LandmarkSet, PoseError, PoseResult};

/// Replays a recording as a stream of per-frame poses
pub struct LandmarkRecording {
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl LandmarkRecording {
    pub fn open(path: &Path) -> PoseResult<Self> {
        if !path.exists() {
            return Err(CaptureError::SourceNotFound(path.to_path_buf()).into());
        }

        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// Number of frames in a recording, without parsing them
    pub fn frame_count(path: &Path) -> PoseResult<u64> {
        let reader = BufReader::new(File::open(path)?);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn parse_line(&self, line: &str) -> PoseResult<Option<LandmarkSet>> {
        serde_json::from_str(line).map_err(|e| PoseError::Recording {
            line: self.line_number,
            message: e.to_string(),
        })
    }
}

impl Iterator for LandmarkRecording {
    type Item = PoseResult<Option<LandmarkSet>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(self.parse_line(trimmed));
        }
    }
}

/// Writes detected poses in the format [`LandmarkRecording`] reads
pub struct LandmarkRecorder {
    writer: BufWriter<File>,
    frames_written: u64,
}

impl LandmarkRecorder {
    pub fn create(path: &Path) -> PoseResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            frames_written: 0,
        })
    }

    pub fn write(&mut self, landmarks: Option<&LandmarkSet>) -> PoseResult<()> {
        serde_json::to_writer(&mut self.writer, &landmarks)?;
        self.writer.write_all(b"\n")?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush buffered lines to disk
    pub fn finish(mut self) -> PoseResult<u64> {
        self.writer.flush()?;
        Ok(self.frames_written)
    }
}
