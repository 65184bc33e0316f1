//! Drives one dequeued render request to a terminal state.
//!
//! Per job: mark rendering, stage inputs, run the renderer, remove staged
//! files, then record `complete` or `failed`. Staged files are always
//! removed before the terminal state becomes visible.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::detection::DetectionStore;
use crate::jobs::{JobStore, RenderRequest};
use crate::logging::{JobLogger, JobLoggerBuilder, LogConfig};

use super::errors::{RenderError, RenderResult};
use super::renderer::{absolute, ProgressSink, RenderInvocation, Renderer};
use super::staging::{StagedFiles, StagingInputs};

/// Result of processing a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Job ID that was processed.
    pub job_id: String,
    /// Whether the job completed successfully.
    pub success: bool,
    /// Rendered video (if successful).
    pub video_location: Option<PathBuf>,
    /// Error detail (if failed).
    pub error: Option<String>,
    /// Staged files that could not be removed.
    pub cleanup_failures: usize,
}

impl JobResult {
    /// Create a successful result.
    pub fn success(job_id: String, video_location: PathBuf, cleanup_failures: usize) -> Self {
        Self {
            job_id,
            success: true,
            video_location: Some(video_location),
            error: None,
            cleanup_failures,
        }
    }

    /// Create a failed result.
    pub fn failure(job_id: String, error: impl Into<String>, cleanup_failures: usize) -> Self {
        Self {
            job_id,
            success: false,
            video_location: None,
            error: Some(error.into()),
            cleanup_failures,
        }
    }
}

/// Runs render requests taken from the queue.
pub struct RenderProcessor {
    jobs: Arc<JobStore>,
    detections: DetectionStore,
    renderer: Arc<dyn Renderer>,
    videos_dir: PathBuf,
    temp_root: PathBuf,
    public_dir: PathBuf,
    log_dir: PathBuf,
    log_config: LogConfig,
    animation_preset: String,
    timeout: Duration,
}

impl RenderProcessor {
    pub fn new(settings: &Settings, jobs: Arc<JobStore>, renderer: Arc<dyn Renderer>) -> Self {
        let paths = &settings.paths;
        Self {
            jobs,
            detections: DetectionStore::from_paths(paths),
            renderer,
            videos_dir: paths.videos_folder(),
            temp_root: PathBuf::from(&paths.temp_root),
            public_dir: paths.renderer_public_path(),
            log_dir: PathBuf::from(&paths.logs_folder),
            log_config: LogConfig::from(&settings.logging),
            animation_preset: settings.renderer.animation_preset.clone(),
            timeout: settings.renderer.timeout(),
        }
    }

    /// Where the video for `job_id` is written.
    pub fn video_path(&self, job_id: &str) -> PathBuf {
        absolute(&self.videos_dir.join(format!("{}.mp4", job_id)))
    }

    /// Process one request. Never panics on render errors; the outcome is
    /// recorded on the job and returned.
    pub fn process(&self, request: &RenderRequest) -> JobResult {
        let job_id = request.job_id.clone();

        match self.jobs.update(&job_id, |job| job.mark_rendering()) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::warn!("{}", e),
            None => tracing::warn!(job_id = %job_id, "Dequeued job has no record"),
        }

        let built = JobLoggerBuilder::new(&job_id, &self.log_dir)
            .config(self.log_config.clone())
            .build();
        let logger = match built {
            Ok(logger) => Arc::new(logger),
            Err(e) => {
                let detail = format!("Failed to create job log: {}", e);
                self.record_failure(&job_id, &detail);
                return JobResult::failure(job_id, detail, 0);
            }
        };

        logger.info(&format!(
            "Render job {} for detection {} ({} animations)",
            job_id,
            request.detection_id,
            request.animations.animations.len()
        ));

        let mut staged = StagedFiles::new(&job_id, &self.temp_root, &self.public_dir);
        let outcome = self.stage_and_render(request, &mut staged, &logger);

        let failures = staged.cleanup();
        for failure in &failures {
            logger.warn(&failure.to_string());
            tracing::warn!(job_id = %job_id, "{}", failure);
        }

        let result = match outcome {
            Ok(video) => {
                logger.success(&format!("Video written to {}", video.display()));
                self.record_success(&job_id, video.clone());
                JobResult::success(job_id, video, failures.len())
            }
            Err(e) => {
                let detail = e.to_string();
                logger.error(&detail);
                logger.show_tail("renderer output");
                self.record_failure(&job_id, &detail);
                JobResult::failure(job_id, detail, failures.len())
            }
        };
        logger.close();
        result
    }

    fn stage_and_render(
        &self,
        request: &RenderRequest,
        staged: &mut StagedFiles,
        logger: &Arc<JobLogger>,
    ) -> RenderResult<PathBuf> {
        logger.phase("Staging");
        let screenshot = self.detections.screenshot_path(&request.detection_id);
        let detection = self.detections.detection_path(&request.detection_id);
        let props_file = staged.stage(&StagingInputs {
            screenshot: &screenshot,
            detection: &detection,
            animations: &request.animations,
            animation_preset: &self.animation_preset,
        })?;

        fs::create_dir_all(&self.videos_dir)
            .map_err(|e| RenderError::staging("creating videos folder", e))?;
        let video = self.video_path(&request.job_id);
        let invocation = RenderInvocation {
            job_id: request.job_id.clone(),
            output: video.clone(),
            props_file: absolute(&props_file),
            timeout: self.timeout,
        };

        logger.phase("Rendering");
        let progress: ProgressSink = {
            let jobs = Arc::clone(&self.jobs);
            let logger = Arc::clone(logger);
            let job_id = request.job_id.clone();
            Arc::new(move |percent| {
                jobs.update(&job_id, |job| job.set_progress(percent));
                logger.progress(u32::from(percent));
            })
        };
        self.renderer.render(&invocation, logger, progress)?;

        if !video.is_file() {
            return Err(RenderError::render_failure(format!(
                "Renderer reported success but wrote no video at {}",
                video.display()
            )));
        }
        Ok(video)
    }

    fn record_success(&self, job_id: &str, video: PathBuf) {
        if let Some(Err(e)) = self.jobs.update(job_id, |job| job.mark_complete(video)) {
            tracing::warn!("{}", e);
        }
        tracing::info!(job_id, "Render complete");
    }

    /// Record a failure, also used by the worker when processing panics.
    pub fn record_failure(&self, job_id: &str, detail: &str) {
        if let Some(Err(e)) = self.jobs.update(job_id, |job| job.mark_failed(detail)) {
            tracing::warn!("{}", e);
        }
        tracing::warn!(job_id, detail, "Render failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnimationConfig, RenderJob, RenderStatus};
    use tempfile::tempdir;

    struct WritesVideo;

    impl Renderer for WritesVideo {
        fn render(
            &self,
            invocation: &RenderInvocation,
            logger: &Arc<JobLogger>,
            progress: ProgressSink,
        ) -> RenderResult<()> {
            assert!(invocation.props_file.is_file());
            logger.output_line("Rendered 60/120", false);
            progress(50);
            fs::write(&invocation.output, b"mp4").unwrap();
            Ok(())
        }
    }

    struct ExitsNonZero;

    impl Renderer for ExitsNonZero {
        fn render(
            &self,
            _invocation: &RenderInvocation,
            logger: &Arc<JobLogger>,
            _progress: ProgressSink,
        ) -> RenderResult<()> {
            logger.output_line("Error: composition crashed", true);
            Err(RenderError::exit_code(Some(1)))
        }
    }

    struct Env {
        _dir: tempfile::TempDir,
        settings: Settings,
        jobs: Arc<JobStore>,
    }

    fn env(detection_id: &str) -> Env {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut settings = Settings::default();
        settings.paths.uploads_root = format!("{}/uploads", root);
        settings.paths.temp_root = format!("{}/temp", root);
        settings.paths.renderer_dir = format!("{}/renderer", root);
        settings.paths.logs_folder = format!("{}/logs", root);

        let store = DetectionStore::from_paths(&settings.paths);
        fs::create_dir_all(settings.paths.detections_folder()).unwrap();
        fs::create_dir_all(settings.paths.screenshots_folder()).unwrap();
        fs::write(store.detection_path(detection_id), b"{\"layers\": []}").unwrap();
        fs::write(store.screenshot_path(detection_id), b"png").unwrap();

        Env {
            _dir: dir,
            settings,
            jobs: Arc::new(JobStore::new()),
        }
    }

    fn request(job_id: &str, detection_id: &str) -> RenderRequest {
        RenderRequest {
            job_id: job_id.to_string(),
            detection_id: detection_id.to_string(),
            animations: AnimationConfig::default(),
        }
    }

    fn staged_leftovers(settings: &Settings, job_id: &str) -> usize {
        [
            PathBuf::from(&settings.paths.temp_root),
            settings.paths.renderer_public_path(),
        ]
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(job_id))
        .count()
    }

    #[test]
    fn successful_render_completes_job() {
        let env = env("det");
        env.jobs.insert(RenderJob::new("job1", "det", RenderStatus::Queued, 1));
        let processor = RenderProcessor::new(&env.settings, Arc::clone(&env.jobs), Arc::new(WritesVideo));

        let result = processor.process(&request("job1", "det"));
        assert!(result.success, "{:?}", result.error);

        let job = env.jobs.get("job1").unwrap();
        assert_eq!(job.status, RenderStatus::Complete);
        assert_eq!(job.progress, 100);
        assert_eq!(job.video_location, result.video_location);
        assert!(job.video_location.unwrap().ends_with("job1.mp4"));
        assert_eq!(staged_leftovers(&env.settings, "job1"), 0);

        let log = fs::read_to_string(PathBuf::from(&env.settings.paths.logs_folder).join("job1.log"))
            .unwrap();
        assert!(log.contains("=== Rendering ==="));
    }

    #[test]
    fn non_zero_exit_fails_job_and_cleans_up() {
        let env = env("det");
        env.jobs.insert(RenderJob::new("job1", "det", RenderStatus::Rendering, 0));
        let processor =
            RenderProcessor::new(&env.settings, Arc::clone(&env.jobs), Arc::new(ExitsNonZero));

        let result = processor.process(&request("job1", "det"));
        assert!(!result.success);

        let job = env.jobs.get("job1").unwrap();
        assert_eq!(job.status, RenderStatus::Failed);
        assert_eq!(job.error_detail.as_deref(), Some("Process exited with code 1"));
        assert!(job.completed_at.is_some());
        assert_eq!(staged_leftovers(&env.settings, "job1"), 0);
    }

    #[test]
    fn missing_screenshot_fails_at_staging() {
        let env = env("det");
        fs::remove_file(DetectionStore::from_paths(&env.settings.paths).screenshot_path("det"))
            .unwrap();
        env.jobs.insert(RenderJob::new("job1", "det", RenderStatus::Rendering, 0));
        let processor = RenderProcessor::new(&env.settings, Arc::clone(&env.jobs), Arc::new(WritesVideo));

        let result = processor.process(&request("job1", "det"));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("copying screenshot"));
        assert_eq!(env.jobs.get("job1").unwrap().status, RenderStatus::Failed);
        assert_eq!(staged_leftovers(&env.settings, "job1"), 0);
    }

    #[test]
    fn success_without_video_is_failure() {
        struct SilentRenderer;
        impl Renderer for SilentRenderer {
            fn render(
                &self,
                _invocation: &RenderInvocation,
                _logger: &Arc<JobLogger>,
                _progress: ProgressSink,
            ) -> RenderResult<()> {
                Ok(())
            }
        }

        let env = env("det");
        env.jobs.insert(RenderJob::new("job1", "det", RenderStatus::Rendering, 0));
        let processor =
            RenderProcessor::new(&env.settings, Arc::clone(&env.jobs), Arc::new(SilentRenderer));

        let result = processor.process(&request("job1", "det"));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("wrote no video"));
    }
}
