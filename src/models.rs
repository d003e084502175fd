use std::fmt;

use crate::core::db::NewDetection;
use crate::error::InvalidDetection;

/// One box produced by a detector, in pixel coordinates of the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPrediction {
    pub label: String,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoxPrediction {
    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoxPrediction) -> f32 {
        let ix = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let iy = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    pub fn validate(&self) -> Result<(), InvalidDetection> {
        validate_detection(
            self.confidence as f64,
            self.xmin as f64,
            self.ymin as f64,
            self.xmax as f64,
            self.ymax as f64,
        )
    }
}

/// Checks the invariants every stored detection must hold:
/// finite coordinates, `xmin <= xmax`, `ymin <= ymax`, `0 <= confidence <= 1`.
pub fn validate_detection(
    confidence: f64,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
) -> Result<(), InvalidDetection> {
    if ![xmin, ymin, xmax, ymax].iter().all(|v| v.is_finite()) {
        return Err(InvalidDetection::NonFinite);
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(InvalidDetection::ConfidenceOutOfRange(confidence));
    }
    if xmin > xmax || ymin > ymax {
        return Err(InvalidDetection::InvertedBox { xmin, ymin, xmax, ymax });
    }
    Ok(())
}

/// Pipeline stage at which an image was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inference,
    Relocation,
    Validation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Inference => "inference",
            Stage::Relocation => "relocation",
            Stage::Validation => "validation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub image_name: String,
    pub stage: Stage,
    pub reason: String,
}

/// Everything produced by one directory run, handed to the store as a unit.
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
    pub run_id: String,
    pub detections: Vec<NewDetection>,
    pub skipped: Vec<SkippedImage>,
    pub images_processed: usize,
}

impl DetectionBatch {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Names of images skipped at `stage`.
    pub fn skipped_at(&self, stage: Stage) -> Vec<&str> {
        self.skipped
            .iter()
            .filter(|s| s.stage == stage)
            .map(|s| s.image_name.as_str())
            .collect()
    }
}
