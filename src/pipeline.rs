use std::path::{Path, PathBuf};

use anyhow::Context;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::db::NewDetection;
use crate::detection::{ObjectDetector, RunOutput};
use crate::models::{BoxPrediction, DetectionBatch, SkippedImage, Stage};
use crate::relocate::{RunSelector, clear_run_dir, relocate};

/// Runs a detector over every image of a directory and collects the results.
///
/// Images are processed one at a time. A failing image is logged and recorded
/// in the batch, never fatal for the run. When the annotated copy of an image
/// cannot be relocated its detections are kept with no `image_path`.
pub struct DetectionPipeline<D: ObjectDetector> {
    detector: D,
    transient_root: PathBuf,
    output_dir: PathBuf,
}

impl<D: ObjectDetector> DetectionPipeline<D> {
    /// `output_dir` receives the annotated images; run scratch space defaults to
    /// `output_dir/.runs`.
    pub fn new(detector: D, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            detector,
            transient_root: output_dir.join(".runs"),
            output_dir,
        }
    }

    pub fn with_transient_root(mut self, transient_root: impl Into<PathBuf>) -> Self {
        self.transient_root = transient_root.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Processes `image_dir` under a fresh run id.
    pub fn run(&self, image_dir: &Path) -> anyhow::Result<DetectionBatch> {
        self.run_with_id(image_dir, &Uuid::new_v4().to_string())
    }

    pub fn run_with_id(&self, image_dir: &Path, run_id: &str) -> anyhow::Result<DetectionBatch> {
        let images = list_images(image_dir)?;
        let run = RunOutput::new(&self.transient_root, run_id);
        let mut batch = DetectionBatch::new(run_id);

        tracing::info!(
            run_id,
            images = images.len(),
            model = self.detector.name(),
            dir = %image_dir.display(),
            "starting detection run"
        );

        for image_path in &images {
            self.process_image(image_path, &run, &mut batch);
        }

        if let Err(e) = clear_run_dir(&run.dir()) {
            tracing::debug!(run_id, error = %e, "run directory left in place");
        }

        tracing::info!(
            run_id,
            images = batch.images_processed,
            detections = batch.len(),
            skipped = batch.skipped.len(),
            "detection run finished"
        );
        Ok(batch)
    }

    fn process_image(&self, image_path: &Path, run: &RunOutput, batch: &mut DetectionBatch) {
        let image_name = match image_path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => return,
        };
        batch.images_processed += 1;

        let predictions = match self.detector.infer(image_path, run) {
            Ok(predictions) => predictions,
            Err(e) => {
                record_skip(batch, &image_name, Stage::Inference, e.to_string());
                return;
            }
        };

        let selector = RunSelector::Named(run.run_id().to_string());
        let annotated_path = match relocate(run.root(), &selector, &image_name, &self.output_dir) {
            Ok(path) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                record_skip(batch, &image_name, Stage::Relocation, e.to_string());
                None
            }
        };

        let detection_time = OffsetDateTime::now_utc();
        let mut accepted = 0usize;
        for prediction in predictions {
            if let Err(e) = prediction.validate() {
                record_skip(
                    batch,
                    &image_name,
                    Stage::Validation,
                    format!("{} box rejected: {}", prediction.label, e),
                );
                continue;
            }
            batch.detections.push(to_new_detection(
                &image_name,
                prediction,
                annotated_path.clone(),
                detection_time,
            ));
            accepted += 1;
        }

        tracing::info!(image = %image_name, detections = accepted, path = ?annotated_path, "processed image");
    }
}

fn to_new_detection(
    image_name: &str,
    prediction: BoxPrediction,
    image_path: Option<String>,
    detection_time: OffsetDateTime,
) -> NewDetection {
    NewDetection {
        img_name: image_name.to_string(),
        name: prediction.label,
        confidence: f64::from(prediction.confidence),
        xmin: f64::from(prediction.xmin),
        ymin: f64::from(prediction.ymin),
        xmax: f64::from(prediction.xmax),
        ymax: f64::from(prediction.ymax),
        image_path,
        detection_time: Some(detection_time),
    }
}

fn record_skip(batch: &mut DetectionBatch, image_name: &str, stage: Stage, reason: String) {
    tracing::warn!(image = image_name, %stage, error = %reason, "image skipped");
    batch.skipped.push(SkippedImage {
        image_name: image_name.to_string(),
        stage,
        reason,
    });
}

/// Regular files directly inside `dir`, sorted by name.
fn list_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read image directory {:?}", dir))?
    {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        if entry.file_type()?.is_file() {
            images.push(entry.path());
        }
    }
    images.sort();
    Ok(images)
}
