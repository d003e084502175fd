pub mod api;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod relocate;

pub use config::Config;
pub use core::db::{Detection, DetectionDb, DetectionRepository, DetectionUpdate, NewDetection};
pub use detection::{ObjectDetector, RunOutput, YoloDetector};
pub use models::{BoxPrediction, DetectionBatch, SkippedImage, Stage};
pub use pipeline::DetectionPipeline;
pub use relocate::{RunSelector, relocate};
