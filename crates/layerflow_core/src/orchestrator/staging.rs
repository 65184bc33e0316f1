//! Per-job transient files handed to the external renderer.
//!
//! Staged for job `<id>`:
//! - `<temp_root>/<id>-config.json` - animation config
//! - `<public>/<id>-screenshot.png`, `<public>/<id>-detection.json`,
//!   `<public>/<id>-config.json` - renderer inputs
//! - `<temp_root>/<id>-props.json` - renderer input properties
//!
//! Every path is recorded before it is written, so cleanup also covers
//! files left behind by a failed write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::AnimationConfig;

use super::errors::{CleanupFailure, RenderError, RenderResult};

/// Input properties read by the renderer composition.
///
/// File references are names relative to the renderer's public directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProps {
    pub screenshot_url: String,
    pub detection_data_path: String,
    pub animation_config_path: String,
    pub animation_preset: String,
}

/// Source files for one job's staging.
#[derive(Debug, Clone, Copy)]
pub struct StagingInputs<'a> {
    pub screenshot: &'a Path,
    pub detection: &'a Path,
    pub animations: &'a AnimationConfig,
    pub animation_preset: &'a str,
}

/// Transient files created for one job.
#[derive(Debug)]
pub struct StagedFiles {
    job_id: String,
    temp_root: PathBuf,
    public_dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new(
        job_id: impl Into<String>,
        temp_root: impl Into<PathBuf>,
        public_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            temp_root: temp_root.into(),
            public_dir: public_dir.into(),
            paths: Vec::new(),
        }
    }

    /// Paths created (or attempted) so far.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Stage every renderer input and return the properties file path.
    pub fn stage(&mut self, inputs: &StagingInputs<'_>) -> RenderResult<PathBuf> {
        fs::create_dir_all(&self.temp_root)
            .map_err(|e| RenderError::staging("creating temp folder", e))?;
        fs::create_dir_all(&self.public_dir)
            .map_err(|e| RenderError::staging("creating renderer input folder", e))?;

        let config_json = serde_json::to_string_pretty(inputs.animations)
            .map_err(|e| RenderError::staging("serializing animation config", e.into()))?;
        let temp_config = self.temp_root.join(self.file_name("config.json"));
        self.write(&temp_config, config_json.as_bytes(), "writing animation config")?;

        let screenshot_name = self.file_name("screenshot.png");
        let detection_name = self.file_name("detection.json");
        let config_name = self.file_name("config.json");

        self.copy(
            inputs.screenshot,
            &self.public_dir.join(&screenshot_name),
            "copying screenshot",
        )?;
        self.copy(
            inputs.detection,
            &self.public_dir.join(&detection_name),
            "copying detection",
        )?;
        self.copy(
            &temp_config,
            &self.public_dir.join(&config_name),
            "copying animation config",
        )?;

        let props = RenderProps {
            screenshot_url: screenshot_name,
            detection_data_path: detection_name,
            animation_config_path: config_name,
            animation_preset: inputs.animation_preset.to_string(),
        };
        let props_json = serde_json::to_string(&props)
            .map_err(|e| RenderError::staging("serializing render props", e.into()))?;
        let props_path = self.temp_root.join(self.file_name("props.json"));
        self.write(&props_path, props_json.as_bytes(), "writing render props")?;

        tracing::debug!(
            job_id = %self.job_id,
            files = self.paths.len(),
            "Staged render inputs"
        );
        Ok(props_path)
    }

    /// Remove every staged file.
    ///
    /// Missing files are ignored; other failures are collected, never raised.
    pub fn cleanup(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => failures.push(CleanupFailure { path, source }),
            }
        }
        failures
    }

    fn file_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.job_id, suffix)
    }

    fn write(&mut self, path: &Path, content: &[u8], operation: &str) -> RenderResult<()> {
        self.paths.push(path.to_path_buf());
        let mut file = fs::File::create(path).map_err(|e| RenderError::staging(operation, e))?;
        file.write_all(content)
            .map_err(|e| RenderError::staging(operation, e))
    }

    fn copy(&mut self, from: &Path, to: &Path, operation: &str) -> RenderResult<()> {
        self.paths.push(to.to_path_buf());
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| RenderError::staging(operation, e))
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for failure in self.cleanup() {
            tracing::warn!("{}", failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        screenshot: PathBuf,
        detection: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let screenshot = root.join("shot.png");
        let detection = root.join("det.json");
        fs::write(&screenshot, b"png").unwrap();
        fs::write(&detection, b"{\"layers\": []}").unwrap();
        Fixture {
            _dir: dir,
            root,
            screenshot,
            detection,
        }
    }

    fn inputs<'a>(fx: &'a Fixture, animations: &'a AnimationConfig) -> StagingInputs<'a> {
        StagingInputs {
            screenshot: &fx.screenshot,
            detection: &fx.detection,
            animations,
            animation_preset: "focus-layer",
        }
    }

    #[test]
    fn stages_all_inputs_and_props() {
        let fx = fixture();
        let animations = AnimationConfig::default();
        let mut staged = StagedFiles::new("job1", fx.root.join("temp"), fx.root.join("public"));

        let props_path = staged.stage(&inputs(&fx, &animations)).unwrap();
        assert_eq!(staged.paths().len(), 5);
        for path in staged.paths() {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert!(fx.root.join("public/job1-screenshot.png").exists());
        assert!(fx.root.join("temp/job1-config.json").exists());

        let props: RenderProps =
            serde_json::from_str(&fs::read_to_string(&props_path).unwrap()).unwrap();
        assert_eq!(props.screenshot_url, "job1-screenshot.png");
        assert_eq!(props.detection_data_path, "job1-detection.json");
        assert_eq!(props.animation_config_path, "job1-config.json");
        assert_eq!(props.animation_preset, "focus-layer");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&props_path).unwrap()).unwrap();
        assert!(raw.get("screenshotUrl").is_some());

        assert!(staged.cleanup().is_empty());
        assert!(!props_path.exists());
        assert!(!fx.root.join("public/job1-config.json").exists());
    }

    #[test]
    fn failed_staging_still_cleans_partial_files() {
        let fx = fixture();
        fs::remove_file(&fx.detection).unwrap();
        let animations = AnimationConfig::default();
        let mut staged = StagedFiles::new("job2", fx.root.join("temp"), fx.root.join("public"));

        let err = staged.stage(&inputs(&fx, &animations)).unwrap_err();
        assert!(matches!(err, RenderError::Staging { .. }));
        assert!(fx.root.join("public/job2-screenshot.png").exists());

        assert!(staged.cleanup().is_empty());
        assert!(!fx.root.join("temp/job2-config.json").exists());
        assert!(!fx.root.join("public/job2-screenshot.png").exists());
    }

    #[test]
    fn drop_removes_leftovers() {
        let fx = fixture();
        let animations = AnimationConfig::default();
        let props_path = {
            let mut staged =
                StagedFiles::new("job3", fx.root.join("temp"), fx.root.join("public"));
            staged.stage(&inputs(&fx, &animations)).unwrap()
        };
        assert!(!props_path.exists());
    }
}
