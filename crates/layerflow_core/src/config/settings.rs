//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Layer detection tuning.
    #[serde(default)]
    pub detection: DetectionSettings,

    /// External renderer invocation.
    #[serde(default)]
    pub renderer: RendererSettings,

    /// Render queue behavior.
    #[serde(default)]
    pub queue: QueueSettings,
}

/// Path configuration for uploads, staging, renderer, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root for stored detections, screenshots, and rendered videos.
    #[serde(default = "default_uploads_root")]
    pub uploads_root: String,

    /// Root folder for per-job transient files.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Working directory of the external renderer.
    #[serde(default = "default_renderer_dir")]
    pub renderer_dir: String,

    /// Directory (relative to `renderer_dir`) the renderer reads inputs from.
    #[serde(default = "default_renderer_public_dir")]
    pub renderer_public_dir: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_uploads_root() -> String {
    "uploads".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_renderer_dir() -> String {
    "renderer".to_string()
}

fn default_renderer_public_dir() -> String {
    "public".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            uploads_root: default_uploads_root(),
            temp_root: default_temp_root(),
            renderer_dir: default_renderer_dir(),
            renderer_public_dir: default_renderer_public_dir(),
            logs_folder: default_logs_folder(),
        }
    }
}

impl PathSettings {
    /// Folder holding persisted detection JSON files.
    pub fn detections_folder(&self) -> PathBuf {
        PathBuf::from(&self.uploads_root).join("detections")
    }

    /// Folder holding stored screenshots.
    pub fn screenshots_folder(&self) -> PathBuf {
        PathBuf::from(&self.uploads_root).join("screenshots")
    }

    /// Folder receiving rendered videos.
    pub fn videos_folder(&self) -> PathBuf {
        PathBuf::from(&self.uploads_root).join("videos")
    }

    /// Absolute-or-relative path of the renderer's input directory.
    pub fn renderer_public_path(&self) -> PathBuf {
        PathBuf::from(&self.renderer_dir).join(&self.renderer_public_dir)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of renderer output lines kept for failure diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Prefix job log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_timestamps: true,
        }
    }
}

/// Layer detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Elements narrower or shorter than this (px) are dropped.
    #[serde(default = "default_min_element_size")]
    pub min_element_size: f64,

    /// Maximum number of layers kept after sorting.
    #[serde(default = "default_max_layers")]
    pub max_layers: usize,

    /// Maximum characters of inner text used as a label.
    #[serde(default = "default_label_max_chars")]
    pub label_max_chars: usize,

    #[serde(default = "default_desktop_width")]
    pub desktop_width: u32,

    #[serde(default = "default_desktop_height")]
    pub desktop_height: u32,

    #[serde(default = "default_mobile_width")]
    pub mobile_width: u32,

    #[serde(default = "default_mobile_height")]
    pub mobile_height: u32,
}

fn default_min_element_size() -> f64 {
    20.0
}

fn default_max_layers() -> usize {
    25
}

fn default_label_max_chars() -> usize {
    60
}

fn default_desktop_width() -> u32 {
    1440
}

fn default_desktop_height() -> u32 {
    900
}

fn default_mobile_width() -> u32 {
    390
}

fn default_mobile_height() -> u32 {
    844
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_element_size: default_min_element_size(),
            max_layers: default_max_layers(),
            label_max_chars: default_label_max_chars(),
            desktop_width: default_desktop_width(),
            desktop_height: default_desktop_height(),
            mobile_width: default_mobile_width(),
            mobile_height: default_mobile_height(),
        }
    }
}

/// External renderer invocation settings.
///
/// The command line is always assembled as an argument vector:
/// `program base_args.. composition_id output --props=<file> --timeout=<ms>
/// --concurrency=<n> extra_args..`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Executable to launch.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the composition id.
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,

    /// Composition rendered for every job.
    #[serde(default = "default_composition_id")]
    pub composition_id: String,

    /// Animation preset passed in the input properties.
    #[serde(default = "default_animation_preset")]
    pub animation_preset: String,

    /// Wall-clock limit for one render, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Worker count the renderer may use internally.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Extra arguments appended verbatim.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

fn default_program() -> String {
    "npx".to_string()
}

fn default_base_args() -> Vec<String> {
    vec!["remotion".to_string(), "render".to_string()]
}

fn default_composition_id() -> String {
    "ExplodedUI".to_string()
}

fn default_animation_preset() -> String {
    "focus-layer".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_concurrency() -> u32 {
    1
}

fn default_extra_args() -> Vec<String> {
    vec![
        "--gl=angle".to_string(),
        "--ignore-gpu-blocklist".to_string(),
        "--log=verbose".to_string(),
    ]
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            base_args: default_base_args(),
            composition_id: default_composition_id(),
            animation_preset: default_animation_preset(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            extra_args: default_extra_args(),
        }
    }
}

impl RendererSettings {
    /// Render time limit as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Render queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Minutes a finished job stays queryable. 0 keeps it for the process lifetime.
    #[serde(default = "default_job_retention_minutes")]
    pub job_retention_minutes: u64,

    /// Interval polling clients should wait between status queries.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_job_retention_minutes() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            job_retention_minutes: default_job_retention_minutes(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl QueueSettings {
    /// Retention window, or `None` when finished jobs are never evicted.
    pub fn retention(&self) -> Option<Duration> {
        (self.job_retention_minutes > 0)
            .then(|| Duration::from_secs(self.job_retention_minutes * 60))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Config sections for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Detection,
    Renderer,
    Queue,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Detection,
        ConfigSection::Renderer,
        ConfigSection::Queue,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Detection => "detection",
            ConfigSection::Renderer => "renderer",
            ConfigSection::Queue => "queue",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# Storage, staging, and renderer directories",
            ConfigSection::Logging => "# Logging configuration",
            ConfigSection::Detection => "# Layer detection heuristics",
            ConfigSection::Renderer => "# External renderer command",
            ConfigSection::Queue => "# Render queue and job retention",
        }
    }
}
