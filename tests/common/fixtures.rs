use std::path::{Path, PathBuf};

use chanvision::core::db::{DetectionDb, NewDetection};
use chanvision::error::DetectError;
use chanvision::{BoxPrediction, ObjectDetector, RunOutput};
use image::{ImageBuffer, Rgb};

/// Opens a fresh database inside a temp directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_db() -> (DetectionDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let db = DetectionDb::open(&url)
        .await
        .expect("Failed to open test database");
    (db, dir)
}

/// Writes a 64x48 red PNG named `name` into `dir`.
pub fn write_test_image(dir: &Path, name: &str) -> PathBuf {
    let img = ImageBuffer::from_fn(64, 48, |_, _| Rgb([255u8, 0u8, 0u8]));
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Writes bytes that no image decoder accepts.
pub fn write_corrupt_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not a png").expect("Failed to write corrupt image");
    path
}

pub fn make_prediction(label: &str, confidence: f32, bbox: [f32; 4]) -> BoxPrediction {
    BoxPrediction {
        label: label.to_string(),
        confidence,
        xmin: bbox[0],
        ymin: bbox[1],
        xmax: bbox[2],
        ymax: bbox[3],
    }
}

/// Creates a NewDetection with test data
pub fn make_new_detection(img_name: &str, name: &str, confidence: f64) -> NewDetection {
    NewDetection {
        img_name: img_name.to_string(),
        name: name.to_string(),
        confidence,
        xmin: 10.0,
        ymin: 20.0,
        xmax: 110.5,
        ymax: 220.25,
        image_path: Some(format!("YOLO_output/{img_name}")),
        detection_time: None,
    }
}

/// Detector returning the same boxes for every decodable image.
///
/// With `write_annotated` it copies the input into the run directory, the way
/// a real model saves its annotated output.
pub struct StubDetector {
    pub predictions: Vec<BoxPrediction>,
    pub write_annotated: bool,
}

impl StubDetector {
    pub fn new(predictions: Vec<BoxPrediction>) -> Self {
        Self {
            predictions,
            write_annotated: true,
        }
    }

    pub fn without_annotations(mut self) -> Self {
        self.write_annotated = false;
        self
    }
}

impl ObjectDetector for StubDetector {
    fn infer(&self, image_path: &Path, run: &RunOutput) -> Result<Vec<BoxPrediction>, DetectError> {
        let img = image::open(image_path).map_err(|e| DetectError::input(image_path, e))?;
        if self.write_annotated {
            let name = image_path
                .file_name()
                .expect("image path has a file name")
                .to_string_lossy();
            let out = run.annotated_path(&name);
            std::fs::create_dir_all(run.dir()).map_err(|e| DetectError::inference(image_path, e))?;
            img.save(&out)
                .map_err(|e| DetectError::inference(image_path, e))?;
        }
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}
