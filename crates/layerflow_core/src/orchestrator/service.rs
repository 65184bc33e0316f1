//! Render submission and status polling.
//!
//! `RenderService` owns the job table, the queue, and the single worker.
//! Submissions are validated synchronously; rejected ones leave no record.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::Settings;
use crate::detection::DetectionStore;
use crate::jobs::{JobStore, RenderQueue, RenderRequest};
use crate::models::{AnimationConfig, JobStatusReport, RenderJob};

use super::errors::{RenderError, RenderResult};
use super::processor::RenderProcessor;
use super::renderer::{Renderer, SubprocessRenderer};
use super::worker::RenderWorker;

/// Entry point for render jobs.
pub struct RenderService {
    jobs: Arc<JobStore>,
    queue: Arc<RenderQueue>,
    detections: DetectionStore,
    retention: Option<Duration>,
    worker: Mutex<RenderWorker>,
}

impl RenderService {
    /// Start a service that renders with the configured subprocess.
    pub fn start(settings: &Settings) -> RenderResult<Self> {
        let renderer = SubprocessRenderer::new(
            settings.renderer.clone(),
            &settings.paths.renderer_dir,
        );
        Self::with_renderer(settings, Arc::new(renderer))
    }

    /// Start a service with a custom renderer.
    pub fn with_renderer(settings: &Settings, renderer: Arc<dyn Renderer>) -> RenderResult<Self> {
        let jobs = Arc::new(JobStore::new());
        let queue = Arc::new(RenderQueue::new());
        let processor = Arc::new(RenderProcessor::new(settings, Arc::clone(&jobs), renderer));
        let worker = RenderWorker::spawn(Arc::clone(&queue), processor).map_err(|e| {
            RenderError::render_failure(format!("Failed to start render worker: {}", e))
        })?;

        tracing::debug!("Render service started");
        Ok(Self {
            jobs,
            queue,
            detections: DetectionStore::from_paths(&settings.paths),
            retention: settings.queue.retention(),
            worker: Mutex::new(worker),
        })
    }

    /// Accept a render request and return its job id.
    ///
    /// The job exists as `rendering` (idle queue) or `queued` by the time this
    /// returns.
    pub fn submit(&self, detection_id: &str, animations: AnimationConfig) -> RenderResult<String> {
        let detection_id = detection_id.trim();
        if detection_id.is_empty() {
            return Err(RenderError::invalid_input("detection id is required"));
        }
        let detection = self.detections.load(detection_id)?;
        if !self.detections.screenshot_path(detection_id).is_file() {
            return Err(RenderError::not_found(format!(
                "screenshot for detection '{}'",
                detection_id
            )));
        }
        animations
            .validate(&detection)
            .map_err(RenderError::invalid_input)?;

        if let Some(retention) = self.retention {
            self.jobs.prune_finished(retention);
        }

        let request = RenderRequest {
            job_id: Uuid::new_v4().to_string(),
            detection_id: detection_id.to_string(),
            animations,
        };
        let job_id = request.job_id.clone();

        let jobs = &self.jobs;
        let admission = self
            .queue
            .enqueue(request, |request, admission| {
                jobs.insert(RenderJob::new(
                    &request.job_id,
                    &request.detection_id,
                    admission.status,
                    admission.queue_position,
                ));
            })
            .ok_or(RenderError::Stopped)?;

        tracing::info!(
            job_id = %job_id,
            detection_id,
            status = %admission.status,
            queue_position = admission.queue_position,
            "Render job accepted"
        );
        Ok(job_id)
    }

    /// Current status of a job.
    pub fn get_status(&self, job_id: &str) -> RenderResult<JobStatusReport> {
        self.jobs
            .get(job_id)
            .map(|job| job.report())
            .ok_or_else(|| RenderError::not_found(format!("job '{}'", job_id)))
    }

    pub fn job(&self, job_id: &str) -> Option<RenderJob> {
        self.jobs.get(job_id)
    }

    /// Status of every tracked job, oldest first.
    pub fn list_jobs(&self) -> Vec<JobStatusReport> {
        self.jobs.list().iter().map(RenderJob::report).collect()
    }

    /// Block until nothing is queued or rendering. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.queue.wait_idle(timeout)
    }

    /// Stop accepting work and wait for the current render to finish.
    ///
    /// Jobs still queued are not started.
    pub fn shutdown(&self) {
        if !self.queue.is_closed() {
            let pending = self.queue.pending_len();
            tracing::info!(pending, "Stopping render service");
        }
        self.queue.close();
        self.worker.lock().join();
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::JobLogger;
    use crate::models::{
        AnimationType, BoundingBox, DetectionResult, Dimensions, ElementType, Layer,
        LayerAnimation, RenderStatus,
    };
    use crate::orchestrator::renderer::{ProgressSink, RenderInvocation};
    use image::{Rgb, RgbImage};
    use parking_lot::Condvar;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tempfile::TempDir;

    /// Renderer that writes a video once the gate opens.
    #[derive(Default)]
    struct GatedRenderer {
        open: Mutex<bool>,
        opened: Condvar,
        calls: AtomicUsize,
    }

    impl GatedRenderer {
        fn open(&self) {
            *self.open.lock() = true;
            self.opened.notify_all();
        }
    }

    impl Renderer for GatedRenderer {
        fn render(
            &self,
            invocation: &RenderInvocation,
            _logger: &Arc<JobLogger>,
            progress: ProgressSink,
        ) -> RenderResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock();
            while !*open {
                self.opened.wait(&mut open);
            }
            progress(40);
            fs::write(&invocation.output, b"mp4").map_err(|e| RenderError::staging("video", e))
        }
    }

    /// Fails the first render, succeeds afterwards.
    #[derive(Default)]
    struct FailsFirst {
        calls: AtomicUsize,
    }

    impl Renderer for FailsFirst {
        fn render(
            &self,
            invocation: &RenderInvocation,
            _logger: &Arc<JobLogger>,
            _progress: ProgressSink,
        ) -> RenderResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RenderError::exit_code(Some(1)));
            }
            fs::write(&invocation.output, b"mp4").map_err(|e| RenderError::staging("video", e))
        }
    }

    struct Env {
        dir: TempDir,
        settings: Settings,
        detection_id: String,
    }

    fn env() -> Env {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut settings = Settings::default();
        settings.paths.uploads_root = format!("{}/uploads", root);
        settings.paths.temp_root = format!("{}/temp", root);
        settings.paths.renderer_dir = format!("{}/renderer", root);
        settings.paths.logs_folder = format!("{}/logs", root);

        let shot = dir.path().join("shot.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])).save(&shot).unwrap();
        let detection = DetectionResult {
            layers: vec![Layer {
                element_type: ElementType::Button,
                label: "Sign up".to_string(),
                bounding_box: BoundingBox::new(10, 10, 120, 40),
                z_depth: 8,
                is_interactive: true,
            }],
            dimensions: Dimensions {
                width: 1440,
                height: 900,
            },
            url: None,
            method: Default::default(),
        };
        let detection_id = DetectionStore::from_paths(&settings.paths)
            .save(&detection, &shot)
            .unwrap();

        Env {
            dir,
            settings,
            detection_id,
        }
    }

    fn pop_out() -> AnimationConfig {
        AnimationConfig {
            animations: vec![LayerAnimation {
                layer_id: 0,
                kind: AnimationType::PopOut,
                delay: 0,
                duration: 30,
            }],
        }
    }

    fn staged_leftovers(env: &Env) -> Vec<PathBuf> {
        [
            PathBuf::from(&env.settings.paths.temp_root),
            env.settings.paths.renderer_public_path(),
        ]
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect()
    }

    #[test]
    fn back_to_back_submissions_queue_behind_first() {
        let env = env();
        let renderer = Arc::new(GatedRenderer::default());
        let service = RenderService::with_renderer(&env.settings, renderer.clone()).unwrap();

        let ids: Vec<String> = (0..3)
            .map(|_| service.submit(&env.detection_id, pop_out()).unwrap())
            .collect();

        let first = service.get_status(&ids[0]).unwrap();
        assert_eq!(first.status, RenderStatus::Rendering);
        assert_eq!(first.queue_position, 0);
        for (index, id) in ids.iter().enumerate().skip(1) {
            let report = service.get_status(id).unwrap();
            assert_eq!(report.status, RenderStatus::Queued);
            assert_eq!(report.queue_position, index);
        }

        renderer.open();
        assert!(service.wait_idle(Duration::from_secs(10)));
        for id in &ids {
            let report = service.get_status(id).unwrap();
            assert_eq!(report.status, RenderStatus::Complete);
            assert_eq!(report.progress, 100);
            assert!(report.video_location.unwrap().ends_with(format!("{}.mp4", id)));
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
        assert!(staged_leftovers(&env).is_empty());
    }

    #[test]
    fn failed_render_does_not_block_next_job() {
        let env = env();
        let service =
            RenderService::with_renderer(&env.settings, Arc::new(FailsFirst::default())).unwrap();

        let failed = service.submit(&env.detection_id, pop_out()).unwrap();
        let next = service.submit(&env.detection_id, pop_out()).unwrap();
        assert!(service.wait_idle(Duration::from_secs(10)));

        let report = service.get_status(&failed).unwrap();
        assert_eq!(report.status, RenderStatus::Failed);
        assert_eq!(report.error_detail.as_deref(), Some("Process exited with code 1"));
        assert!(report.completed_at.is_some());

        assert_eq!(service.get_status(&next).unwrap().status, RenderStatus::Complete);
        assert!(staged_leftovers(&env).is_empty());
    }

    #[test]
    fn unknown_job_is_not_found() {
        let env = env();
        let service =
            RenderService::with_renderer(&env.settings, Arc::new(FailsFirst::default())).unwrap();
        let err = service.get_status("never-submitted").unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    #[test]
    fn at_most_one_job_renders_at_a_time() {
        let env = env();
        let renderer = Arc::new(GatedRenderer::default());
        let service = RenderService::with_renderer(&env.settings, renderer.clone()).unwrap();

        for _ in 0..4 {
            service.submit(&env.detection_id, pop_out()).unwrap();
        }
        renderer.open();

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let reports = service.list_jobs();
            let rendering = reports
                .iter()
                .filter(|r| r.status == RenderStatus::Rendering)
                .count();
            assert!(rendering <= 1, "{} jobs rendering at once", rendering);
            if reports.iter().all(|r| r.status.is_terminal()) || Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(service.wait_idle(Duration::from_secs(10)));
    }

    #[test]
    fn rejected_submissions_create_no_job() {
        let env = env();
        let service =
            RenderService::with_renderer(&env.settings, Arc::new(FailsFirst::default())).unwrap();

        assert!(matches!(
            service.submit("  ", pop_out()),
            Err(RenderError::InvalidInput(_))
        ));
        assert!(matches!(
            service.submit("missing-detection", pop_out()),
            Err(RenderError::NotFound(_))
        ));

        let mut bad_layer = pop_out();
        bad_layer.animations[0].layer_id = 5;
        assert!(matches!(
            service.submit(&env.detection_id, bad_layer),
            Err(RenderError::InvalidInput(_))
        ));

        let mut zero_duration = pop_out();
        zero_duration.animations[0].duration = 0;
        assert!(matches!(
            service.submit(&env.detection_id, zero_duration),
            Err(RenderError::InvalidInput(_))
        ));

        fs::remove_file(
            DetectionStore::from_paths(&env.settings.paths).screenshot_path(&env.detection_id),
        )
        .unwrap();
        assert!(matches!(
            service.submit(&env.detection_id, pop_out()),
            Err(RenderError::NotFound(_))
        ));

        assert!(service.list_jobs().is_empty());
        assert!(env.dir.path().join("uploads").exists());
    }

    #[test]
    fn shutdown_rejects_new_work() {
        let env = env();
        let service =
            RenderService::with_renderer(&env.settings, Arc::new(FailsFirst::default())).unwrap();
        service.shutdown();
        assert!(matches!(
            service.submit(&env.detection_id, pop_out()),
            Err(RenderError::Stopped)
        ));
        service.shutdown();
    }
}
