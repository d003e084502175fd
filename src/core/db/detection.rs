use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::error::{InvalidDetection, StoreError};
use crate::models::validate_detection;

/// A persisted detection row. Only the store hands these out.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub id: i64,
    pub img_name: String,
    pub name: String,
    pub confidence: f64,
    #[serde(rename = "xmin_coord")]
    pub xmin: f64,
    pub ymin: f64,
    #[serde(rename = "xmax_coord")]
    pub xmax: f64,
    pub ymax: f64,
    pub image_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub detection_time: OffsetDateTime,
    #[serde(skip)]
    pub(super) _guard: (),
}

/// Fields for a detection that has not been stored yet.
///
/// `detection_time` left unset is filled in by the database at insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetection {
    pub img_name: String,
    pub name: String,
    pub confidence: f64,
    #[serde(rename = "xmin_coord")]
    pub xmin: f64,
    pub ymin: f64,
    #[serde(rename = "xmax_coord")]
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub detection_time: Option<OffsetDateTime>,
}

impl NewDetection {
    pub fn validate(&self) -> Result<(), InvalidDetection> {
        validate_detection(self.confidence, self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// Tells a field sent as `null` apart from one left out.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial overwrite of a stored detection; `None` fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionUpdate {
    pub img_name: Option<String>,
    pub name: Option<String>,
    pub confidence: Option<f64>,
    #[serde(rename = "xmin_coord")]
    pub xmin: Option<f64>,
    pub ymin: Option<f64>,
    #[serde(rename = "xmax_coord")]
    pub xmax: Option<f64>,
    pub ymax: Option<f64>,
    /// `Some(None)` clears the path; an absent field leaves it alone.
    #[serde(default, deserialize_with = "present_or_null")]
    pub image_path: Option<Option<String>>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub detection_time: Option<OffsetDateTime>,
}

impl DetectionUpdate {
    pub fn is_empty(&self) -> bool {
        self.img_name.is_none()
            && self.name.is_none()
            && self.confidence.is_none()
            && self.xmin.is_none()
            && self.ymin.is_none()
            && self.xmax.is_none()
            && self.ymax.is_none()
            && self.image_path.is_none()
            && self.detection_time.is_none()
    }

    /// Returns `detection` with every field present in the update overwritten.
    pub(super) fn apply_to(&self, mut detection: Detection) -> Detection {
        if let Some(img_name) = &self.img_name {
            detection.img_name = img_name.clone();
        }
        if let Some(name) = &self.name {
            detection.name = name.clone();
        }
        if let Some(confidence) = self.confidence {
            detection.confidence = confidence;
        }
        if let Some(xmin) = self.xmin {
            detection.xmin = xmin;
        }
        if let Some(ymin) = self.ymin {
            detection.ymin = ymin;
        }
        if let Some(xmax) = self.xmax {
            detection.xmax = xmax;
        }
        if let Some(ymax) = self.ymax {
            detection.ymax = ymax;
        }
        if let Some(image_path) = &self.image_path {
            detection.image_path = image_path.clone();
        }
        if let Some(detection_time) = self.detection_time {
            detection.detection_time = detection_time;
        }
        detection
    }
}

/// Create/read/update access to stored detections. Records are never deleted.
pub trait DetectionRepository {
    fn add_detection(
        &self,
        detection: &NewDetection,
    ) -> impl Future<Output = Result<Detection, StoreError>> + Send;
    fn get_detection_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Detection>, StoreError>> + Send;
    /// Detections in insertion order, skipping `skip` rows and returning at most `limit`.
    fn get_detections(
        &self,
        skip: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Detection>, StoreError>> + Send;
    /// `Ok(None)` when no detection has this id.
    fn update_detection(
        &self,
        id: i64,
        update: &DetectionUpdate,
    ) -> impl Future<Output = Result<Option<Detection>, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_null_image_path_from_absent() {
        let absent: DetectionUpdate = serde_json::from_str(r#"{"name": "cup"}"#).unwrap();
        assert_eq!(absent.image_path, None);

        let cleared: DetectionUpdate = serde_json::from_str(r#"{"image_path": null}"#).unwrap();
        assert_eq!(cleared.image_path, Some(None));
        assert!(!cleared.is_empty());

        let set: DetectionUpdate =
            serde_json::from_str(r#"{"image_path": "YOLO_output/a.jpg"}"#).unwrap();
        assert_eq!(set.image_path, Some(Some("YOLO_output/a.jpg".to_string())));
    }
}
