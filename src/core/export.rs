use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::core::db::NewDetection;

pub const DEFAULT_CSV_NAME: &str = "all_images_detections.csv";

#[derive(Serialize)]
struct CsvRow<'a> {
    img_name: &'a str,
    name: &'a str,
    confidence: f64,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl<'a> From<&'a NewDetection> for CsvRow<'a> {
    fn from(d: &'a NewDetection) -> Self {
        Self {
            img_name: &d.img_name,
            name: &d.name,
            confidence: d.confidence,
            xmin: d.xmin,
            ymin: d.ymin,
            xmax: d.xmax,
            ymax: d.ymax,
        }
    }
}

/// Writes one row per detection to `output_dir/csv_name` and returns the path.
pub fn write_detections_csv(
    detections: &[NewDetection],
    output_dir: &Path,
    csv_name: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    let path = output_dir.join(csv_name);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("Failed to create CSV file {:?}", path))?;

    // Header is written by hand so an empty batch still yields one.
    writer.write_record(["img_name", "name", "confidence", "xmin", "ymin", "xmax", "ymax"])?;
    for detection in detections {
        writer.serialize(CsvRow::from(detection))?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = detections.len(), "saved detections to CSV");
    Ok(path)
}
