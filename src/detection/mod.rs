pub mod annotate;
pub mod labels;
pub mod yolo;

use std::path::{Path, PathBuf};

use crate::error::DetectError;
use crate::models::BoxPrediction;

pub use yolo::{YoloDetector, YoloParams};

/// Scratch directory of one pipeline run: `root/run_id`.
///
/// Detectors may write annotated copies of their input here; the relocation
/// helper later moves them out using the same run id.
#[derive(Debug, Clone)]
pub struct RunOutput {
    root: PathBuf,
    run_id: String,
}

impl RunOutput {
    pub fn new(root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            run_id: run_id.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.run_id)
    }

    pub fn annotated_path(&self, image_name: &str) -> PathBuf {
        self.dir().join(image_name)
    }
}

/// Object detection capability used by the pipeline.
pub trait ObjectDetector: Send + Sync {
    /// Runs the model on one image. The order of the returned boxes is unspecified.
    fn infer(&self, image_path: &Path, run: &RunOutput) -> Result<Vec<BoxPrediction>, DetectError>;

    /// Human-readable name for log output.
    fn name(&self) -> &str;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn infer(&self, image_path: &Path, run: &RunOutput) -> Result<Vec<BoxPrediction>, DetectError> {
        (**self).infer(image_path, run)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
