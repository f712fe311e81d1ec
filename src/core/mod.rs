pub mod config;
pub mod database;
pub mod geometry;
pub mod smoothing;

// Form evaluation
pub mod posture_checker;
pub mod form_detector;

// Run tracking
pub mod tracking;
