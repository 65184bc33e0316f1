//! External renderer invocation.
//!
//! The renderer is an opaque subprocess. It is launched with an explicit
//! argument vector in a process group of its own, and its output is
//! streamed into the job log. The whole group is killed on timeout and
//! swept once the renderer exits, so no descendant outlives a job.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::config::RendererSettings;
use crate::logging::JobLogger;

use super::errors::{RenderError, RenderResult};

/// Receives renderer progress in percent.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Everything one renderer run needs.
#[derive(Debug, Clone)]
pub struct RenderInvocation {
    pub job_id: String,
    /// Destination video file.
    pub output: PathBuf,
    /// JSON input-properties file.
    pub props_file: PathBuf,
    pub timeout: Duration,
}

/// Capability to turn staged inputs into a video.
pub trait Renderer: Send + Sync {
    /// Run one render to completion.
    ///
    /// Returns `Ok` only when the renderer reported success.
    fn render(
        &self,
        invocation: &RenderInvocation,
        logger: &Arc<JobLogger>,
        progress: ProgressSink,
    ) -> RenderResult<()>;
}

/// Renderer launched as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessRenderer {
    settings: RendererSettings,
    working_dir: PathBuf,
}

impl SubprocessRenderer {
    pub fn new(settings: RendererSettings, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            working_dir: working_dir.into(),
        }
    }

    /// Argument vector for one invocation, excluding the program.
    pub fn build_args(&self, invocation: &RenderInvocation) -> Vec<String> {
        let mut args = self.settings.base_args.clone();
        args.push(self.settings.composition_id.clone());
        args.push(invocation.output.to_string_lossy().into_owned());
        args.push(format!("--props={}", invocation.props_file.display()));
        args.push(format!("--timeout={}", invocation.timeout.as_millis()));
        args.push(format!("--concurrency={}", self.settings.concurrency.max(1)));
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }

    fn spawn(&self, args: &[String]) -> RenderResult<Child> {
        let mut command = Command::new(&self.settings.program);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut command);
        command.spawn().map_err(|e| {
            RenderError::render_failure(format!(
                "Failed to launch renderer '{}': {}",
                self.settings.program, e
            ))
        })
    }
}

impl Renderer for SubprocessRenderer {
    fn render(
        &self,
        invocation: &RenderInvocation,
        logger: &Arc<JobLogger>,
        progress: ProgressSink,
    ) -> RenderResult<()> {
        let args = self.build_args(invocation);
        logger.command(&format!("{} {}", self.settings.program, args.join(" ")));

        let mut child = self.spawn(&args)?;
        tracing::debug!(job_id = %invocation.job_id, pid = child.id(), "Renderer started");

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| pump_lines(out, false, Arc::clone(logger), Arc::clone(&progress))),
            child
                .stderr
                .take()
                .map(|err| pump_lines(err, true, Arc::clone(logger), Arc::clone(&progress))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let outcome = match child.wait_timeout(invocation.timeout) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                tracing::warn!(job_id = %invocation.job_id, "Renderer killed after timeout");
                Err(RenderError::Timeout {
                    seconds: invocation.timeout.as_secs(),
                })
            }
            Err(e) => Err(RenderError::render_failure(format!(
                "Failed to wait for renderer: {}",
                e
            ))),
        };

        // Launchers such as npx leave the real renderer as a descendant.
        // Nothing in the group may outlive this call.
        kill_process_group(&child);
        if outcome.is_err() {
            let _ = child.kill();
            let _ = child.wait();
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = outcome?;
        if status.success() {
            Ok(())
        } else {
            Err(RenderError::exit_code(status.code()))
        }
    }
}

/// Put the renderer at the head of a new process group.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// SIGKILL every process left in the renderer's group.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: killpg takes no pointers; the group id is the renderer's pid.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        tracing::debug!(pgid, "Killed renderer process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Forward each output line to the job log and progress sink.
fn pump_lines<R>(
    stream: R,
    is_stderr: bool,
    logger: Arc<JobLogger>,
    progress: ProgressSink,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            logger.output_line(&line, is_stderr);
            if let Some(percent) = parse_progress(&line) {
                progress(percent);
            }
        }
    })
}

/// Extract a completion percentage from a renderer output line.
///
/// Understands `Rendered N/M` frame counters and `NN%` figures.
pub fn parse_progress(line: &str) -> Option<u8> {
    if let Some(start) = line.find("Rendered ") {
        let rest = &line[start + "Rendered ".len()..];
        if let Some((done, total)) = rest.split_once('/') {
            let done: u64 = done.trim().parse().ok()?;
            let total: u64 = leading_digits(total.trim_start()).parse().ok()?;
            if total == 0 {
                return None;
            }
            return Some((done.min(total) * 100 / total) as u8);
        }
    }

    let percent_at = line.rfind('%')?;
    let head = &line[..percent_at];
    let number_start = head
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map_or(0, |i| i + 1);
    let value: f64 = head[number_start..].parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

fn leading_digits(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}

/// Resolve `path` against the current directory so it survives a `cwd` change.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
