//! Persisted detections and their screenshots.
//!
//! Layout under the uploads root:
//! - `detections/<id>.json` - the `DetectionResult`
//! - `screenshots/<id>.png` - the screenshot the detection was run on

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};
use uuid::Uuid;

use crate::config::PathSettings;
use crate::models::DetectionResult;

use super::errors::{DetectResult, DetectionError};

/// File-backed detection storage keyed by generated ids.
#[derive(Debug, Clone)]
pub struct DetectionStore {
    detections_dir: PathBuf,
    screenshots_dir: PathBuf,
}

impl DetectionStore {
    pub fn new(detections_dir: impl Into<PathBuf>, screenshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            detections_dir: detections_dir.into(),
            screenshots_dir: screenshots_dir.into(),
        }
    }

    pub fn from_paths(paths: &PathSettings) -> Self {
        Self::new(paths.detections_folder(), paths.screenshots_folder())
    }

    pub fn detection_path(&self, id: &str) -> PathBuf {
        self.detections_dir.join(format!("{}.json", id))
    }

    pub fn screenshot_path(&self, id: &str) -> PathBuf {
        self.screenshots_dir.join(format!("{}.png", id))
    }

    /// Store `result` with a copy of `screenshot` and return the new id.
    ///
    /// The screenshot must decode as an image; non-PNG input is re-encoded.
    pub fn save(&self, result: &DetectionResult, screenshot: &Path) -> DetectResult<String> {
        let id = Uuid::new_v4().to_string();

        fs::create_dir_all(&self.detections_dir)
            .map_err(|e| DetectionError::io("creating detections folder", e))?;
        fs::create_dir_all(&self.screenshots_dir)
            .map_err(|e| DetectionError::io("creating screenshots folder", e))?;

        let screenshot_dest = self.screenshot_path(&id);
        store_screenshot(screenshot, &screenshot_dest)?;

        let json = serde_json::to_string_pretty(result)
            .map_err(|e| DetectionError::json("detection", e))?;
        if let Err(e) = write_atomic(&self.detection_path(&id), json.as_bytes()) {
            let _ = fs::remove_file(&screenshot_dest);
            return Err(DetectionError::io("writing detection", e));
        }

        tracing::info!(
            detection_id = %id,
            layers = result.layers.len(),
            "Stored detection"
        );
        Ok(id)
    }

    /// Load a stored detection.
    pub fn load(&self, id: &str) -> DetectResult<DetectionResult> {
        validate_id(id)?;
        let path = self.detection_path(id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DetectionError::not_found(id));
            }
            Err(e) => return Err(DetectionError::io("reading detection", e)),
        };
        serde_json::from_str(&json).map_err(|e| DetectionError::json("detection", e))
    }

    /// Whether both the detection and its screenshot are present.
    pub fn contains(&self, id: &str) -> bool {
        validate_id(id).is_ok()
            && self.detection_path(id).is_file()
            && self.screenshot_path(id).is_file()
    }
}

/// Ids become file names, so they must be a single plain path component.
fn validate_id(id: &str) -> DetectResult<()> {
    if id.trim().is_empty() {
        return Err(DetectionError::invalid_input("detection id is empty"));
    }
    let plain = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !plain {
        return Err(DetectionError::invalid_input(format!(
            "detection id '{}' contains invalid characters",
            id
        )));
    }
    Ok(())
}

fn store_screenshot(source: &Path, dest: &Path) -> DetectResult<()> {
    let reader = ImageReader::open(source)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| DetectionError::io("opening screenshot", e))?;

    if reader.format() == Some(ImageFormat::Png) {
        let (width, height) = reader.into_dimensions().map_err(|e| {
            DetectionError::invalid_input(format!("screenshot is not a valid PNG: {}", e))
        })?;
        tracing::debug!(width, height, "Copying PNG screenshot");
        fs::copy(source, dest).map_err(|e| DetectionError::io("copying screenshot", e))?;
        return Ok(());
    }

    let image = reader.decode().map_err(|e| {
        DetectionError::invalid_input(format!("screenshot is not a decodable image: {}", e))
    })?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        "Re-encoding screenshot as PNG"
    );
    image
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|e| DetectionError::invalid_input(format!("cannot encode screenshot: {}", e)))
}

fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)
}
