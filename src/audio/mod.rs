//! Audio gating: voice-activity detection and signal-quality scoring.
//!
//! Everything here is pure over a decoded sample buffer; no audio state
//! survives between batches.

pub mod quality;
pub mod vad;

pub use quality::{process, QualityMetrics};
pub use vad::detect_voice;
