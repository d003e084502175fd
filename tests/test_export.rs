//! Integration tests for the CSV export of a detection run.
//!
//! Tests cover:
//! - Header and one row per detection
//! - An empty run still producing a header

mod common;

use chanvision::core::export::{DEFAULT_CSV_NAME, write_detections_csv};
use common::*;

#[test]
fn test_export_writes_header_and_rows() -> anyhow::Result<()> {
    let output = tempfile::TempDir::new()?;
    let detections = vec![
        make_new_detection("a.jpg", "person", 0.91),
        make_new_detection("b.jpg", "cup", 0.5),
    ];

    let path = write_detections_csv(&detections, &output.path().join("YOLO_output"), DEFAULT_CSV_NAME)?;
    assert_eq!(path, output.path().join("YOLO_output").join(DEFAULT_CSV_NAME));

    let content = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "img_name,name,confidence,xmin,ymin,xmax,ymax");
    assert_eq!(lines[1], "a.jpg,person,0.91,10.0,20.0,110.5,220.25");
    assert_eq!(lines[2], "b.jpg,cup,0.5,10.0,20.0,110.5,220.25");
    assert_eq!(lines.len(), 3);

    Ok(())
}

#[test]
fn test_export_of_empty_run_has_header_only() -> anyhow::Result<()> {
    let output = tempfile::TempDir::new()?;

    let path = write_detections_csv(&[], output.path(), "empty.csv")?;
    let content = std::fs::read_to_string(path)?;
    assert_eq!(content.trim_end(), "img_name,name,confidence,xmin,ymin,xmax,ymax");

    Ok(())
}
