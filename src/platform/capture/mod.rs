// Frame sources
// Each source yields decoded frames using the types defined in models/capture.rs

pub mod image_sequence;

pub use image_sequence::{ImageSequence, IMAGE_EXTENSIONS};
