use std::path::{Path, PathBuf};

use image::{RgbImage, imageops::FilterType};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::detection::{ObjectDetector, RunOutput, annotate, labels};
use crate::error::{DetectError, ModelLoadError};
use crate::models::BoxPrediction;

#[derive(Debug, Clone)]
pub struct YoloParams {
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
        }
    }
}

/// How candidates are laid out in the model output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, candidates, 5 + classes]`: box, objectness, class scores.
    ObjectnessRows,
    /// `[1, 4 + classes, candidates]`: box, class scores, no objectness.
    ClassColumns,
}

impl OutputLayout {
    pub fn detect(dim1: usize, dim2: usize, num_classes: usize) -> Option<Self> {
        if dim2 == num_classes + 5 {
            Some(Self::ObjectnessRows)
        } else if dim1 == num_classes + 4 {
            Some(Self::ClassColumns)
        } else {
            None
        }
    }

    fn candidates(self, dim1: usize, dim2: usize) -> usize {
        match self {
            Self::ObjectnessRows => dim1,
            Self::ClassColumns => dim2,
        }
    }
}

/// YOLO object detector running an `.rten` model on the CPU.
pub struct YoloDetector {
    model: Model,
    labels: Vec<String>,
    params: YoloParams,
    name: String,
}

impl YoloDetector {
    /// Loads the model and labels. Uses the COCO class names when `labels_path` is `None`.
    pub fn load(model_path: &Path, labels_path: Option<&Path>) -> Result<Self, ModelLoadError> {
        let load_error = |reason: String| ModelLoadError {
            model: model_path.to_path_buf(),
            reason,
        };

        if !model_path.is_file() {
            return Err(load_error("model file does not exist".to_string()));
        }
        let model = Model::load_file(model_path).map_err(|e| load_error(e.to_string()))?;
        let labels = match labels_path {
            Some(path) => labels::load_labels(path)
                .map_err(|e| load_error(format!("cannot read labels {:?}: {}", path, e)))?,
            None => labels::coco_labels(),
        };
        if labels.is_empty() {
            return Err(load_error("label list is empty".to_string()));
        }

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "yolo".to_string());
        tracing::info!(model = %name, classes = labels.len(), "detection model loaded");

        Ok(Self {
            model,
            labels,
            params: YoloParams::default(),
            name,
        })
    }

    pub fn with_params(mut self, params: YoloParams) -> Self {
        self.params = params;
        self
    }

    fn run_model(&self, rgb: &RgbImage, image_path: &Path) -> Result<NdTensor<f32, 3>, DetectError> {
        let input = to_input_tensor(rgb, self.params.input_size);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| DetectError::inference(image_path, e))?;
        NdTensor::<f32, 3>::try_from(output).map_err(|e| DetectError::inference(image_path, e))
    }
}

impl ObjectDetector for YoloDetector {
    fn infer(&self, image_path: &Path, run: &RunOutput) -> Result<Vec<BoxPrediction>, DetectError> {
        let image = image::open(image_path).map_err(|e| DetectError::input(image_path, e))?;
        let rgb = image.to_rgb8();
        let output = self.run_model(&rgb, image_path)?;

        let (dim1, dim2) = (output.size(1), output.size(2));
        let layout = OutputLayout::detect(dim1, dim2, self.labels.len()).ok_or_else(|| {
            DetectError::inference(
                image_path,
                format!(
                    "output shape [1, {dim1}, {dim2}] does not match {} classes",
                    self.labels.len()
                ),
            )
        })?;

        let scale_x = rgb.width() as f32 / self.params.input_size as f32;
        let scale_y = rgb.height() as f32 / self.params.input_size as f32;
        let candidates = decode_candidates(
            layout,
            layout.candidates(dim1, dim2),
            &self.labels,
            self.params.conf_threshold,
            (scale_x, scale_y),
            (rgb.width() as f32, rgb.height() as f32),
            |candidate, attr| match layout {
                OutputLayout::ObjectnessRows => output[[0, candidate, attr]],
                OutputLayout::ClassColumns => output[[0, attr, candidate]],
            },
        );
        let boxes = non_max_suppression(
            candidates,
            self.params.iou_threshold,
            self.params.max_detections,
        );

        let annotated: PathBuf = match image_path.file_name() {
            Some(file_name) => run.annotated_path(&file_name.to_string_lossy()),
            None => return Err(DetectError::input(image_path, "path has no file name")),
        };
        if let Err(e) = annotate::save_annotated(&rgb, &boxes, &annotated) {
            tracing::warn!(image = %image_path.display(), error = %e, "annotated image not saved");
        }

        Ok(boxes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Resizes to `size`x`size` and packs RGB into a `[1, 3, size, size]` tensor in `[0, 1]`.
fn to_input_tensor(rgb: &RgbImage, size: u32) -> NdTensor<f32, 4> {
    let resized = image::imageops::resize(rgb, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }
    NdTensor::from_data([1, 3, size as usize, size as usize], data)
}

/// Turns raw candidates into boxes in source-image pixels, keeping those whose
/// score reaches `conf_threshold`. `value(candidate, attr)` reads one output cell.
pub fn decode_candidates(
    layout: OutputLayout,
    num_candidates: usize,
    labels: &[String],
    conf_threshold: f32,
    (scale_x, scale_y): (f32, f32),
    (width, height): (f32, f32),
    value: impl Fn(usize, usize) -> f32,
) -> Vec<BoxPrediction> {
    let class_offset = match layout {
        OutputLayout::ObjectnessRows => 5,
        OutputLayout::ClassColumns => 4,
    };

    let mut boxes = Vec::new();
    for i in 0..num_candidates {
        let objectness = match layout {
            OutputLayout::ObjectnessRows => value(i, 4),
            OutputLayout::ClassColumns => 1.0,
        };
        if objectness < conf_threshold {
            continue;
        }

        let mut best = (0usize, f32::MIN);
        for class in 0..labels.len() {
            let score = value(i, class_offset + class);
            if score > best.1 {
                best = (class, score);
            }
        }
        let confidence = (objectness * best.1).clamp(0.0, 1.0);
        if confidence < conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let x0 = ((cx - w / 2.0) * scale_x).clamp(0.0, width);
        let x1 = ((cx + w / 2.0) * scale_x).clamp(0.0, width);
        let y0 = ((cy - h / 2.0) * scale_y).clamp(0.0, height);
        let y1 = ((cy + h / 2.0) * scale_y).clamp(0.0, height);

        boxes.push(BoxPrediction {
            label: labels[best.0].clone(),
            confidence,
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        });
    }
    boxes
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn non_max_suppression(
    mut boxes: Vec<BoxPrediction>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<BoxPrediction> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<BoxPrediction> = Vec::new();
    for candidate in boxes {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.label == candidate.label && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["person".to_string(), "bottle".to_string()]
    }

    #[test]
    fn layout_is_detected_from_shape() {
        assert_eq!(OutputLayout::detect(25200, 85, 80), Some(OutputLayout::ObjectnessRows));
        assert_eq!(OutputLayout::detect(84, 8400, 80), Some(OutputLayout::ClassColumns));
        assert_eq!(OutputLayout::detect(10, 10, 80), None);
    }

    #[test]
    fn objectness_rows_are_decoded_and_scaled() {
        // cx, cy, w, h, obj, person, bottle
        let rows = [
            [100.0, 100.0, 40.0, 20.0, 0.9, 0.1, 0.8],
            [50.0, 50.0, 10.0, 10.0, 0.1, 0.9, 0.0],
        ];
        let boxes = decode_candidates(
            OutputLayout::ObjectnessRows,
            rows.len(),
            &labels(),
            0.25,
            (2.0, 1.0),
            (1000.0, 1000.0),
            |c, a| rows[c][a],
        );
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.label, "bottle");
        assert!((b.confidence - 0.72).abs() < 1e-6);
        assert_eq!((b.xmin, b.xmax), (160.0, 240.0));
        assert_eq!((b.ymin, b.ymax), (90.0, 110.0));
    }

    #[test]
    fn class_columns_are_clamped_to_image() {
        // attrs x candidates: cx, cy, w, h, person, bottle
        let cols = [[5.0], [5.0], [20.0], [4.0], [0.7], [0.2]];
        let boxes = decode_candidates(
            OutputLayout::ClassColumns,
            1,
            &labels(),
            0.25,
            (1.0, 1.0),
            (8.0, 8.0),
            |c, a| cols[a][c],
        );
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].label, "person");
        assert_eq!((boxes[0].xmin, boxes[0].xmax), (0.0, 8.0));
        assert_eq!((boxes[0].ymin, boxes[0].ymax), (3.0, 7.0));
    }

    #[test]
    fn nms_keeps_best_box_per_class() {
        let make = |label: &str, confidence: f32, x: f32| BoxPrediction {
            label: label.to_string(),
            confidence,
            xmin: x,
            ymin: 0.0,
            xmax: x + 10.0,
            ymax: 10.0,
        };
        let kept = non_max_suppression(
            vec![
                make("person", 0.6, 1.0),
                make("person", 0.9, 0.0),
                make("bottle", 0.5, 0.0),
                make("person", 0.7, 50.0),
            ],
            0.45,
            10,
        );
        let summary: Vec<(&str, f32)> =
            kept.iter().map(|b| (b.label.as_str(), b.confidence)).collect();
        assert_eq!(summary, vec![("person", 0.9), ("person", 0.7), ("bottle", 0.5)]);

        let capped = non_max_suppression(kept, 0.45, 2);
        assert_eq!(capped.len(), 2);
    }
}
