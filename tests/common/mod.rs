#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from chanvision for tests
pub use chanvision::core::db::{
    Detection, DetectionDb, DetectionRepository, DetectionUpdate, MessageRepository, NewDetection,
};
pub use chanvision::error::{DetectError, StoreError};
pub use chanvision::{BoxPrediction, DetectionBatch, ObjectDetector, RunOutput, Stage};
