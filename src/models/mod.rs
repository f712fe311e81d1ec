// Data models for landmarks, check verdicts, run records and video frames

pub mod capture;
pub mod check;
pub mod pose;
pub mod session;
