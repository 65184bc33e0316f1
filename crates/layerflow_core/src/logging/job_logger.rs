//! Per-job logger with file and callback output.
//!
//! Each render job gets its own logger that:
//! - Writes to a dedicated log file named after the job id
//! - Forwards formatted lines to a callback (if provided)
//! - Supports compact mode with progress filtering
//! - Keeps a tail buffer of renderer output for failure diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

/// Per-job logger with dual output (file + callback).
pub struct JobLogger {
    /// Job identifier.
    job_id: String,
    /// Path to log file.
    log_path: PathBuf,
    /// File writer (buffered).
    file_writer: Mutex<Option<BufWriter<File>>>,
    /// Callback receiving formatted lines.
    line_callback: Option<LineCallback>,
    /// Logging configuration.
    config: LogConfig,
    /// Recent renderer output lines.
    tail_buffer: Mutex<VecDeque<String>>,
    /// Last progress value logged (for compact mode filtering).
    last_progress: Mutex<Option<u32>>,
}

impl JobLogger {
    /// Create a new job logger.
    ///
    /// # Arguments
    /// * `job_id` - Job identifier (used in log filename)
    /// * `log_dir` - Directory to write log file to
    /// * `config` - Logging configuration
    /// * `line_callback` - Optional callback for every formatted line
    pub fn new(
        job_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        line_callback: Option<LineCallback>,
    ) -> std::io::Result<Self> {
        let job_id = job_id.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_id)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_id,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            line_callback,
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(None),
        })
    }

    /// Get the job id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        let msg = MessagePrefix::Warning.format(message);
        self.log(LogLevel::Warn, &msg);
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        let msg = MessagePrefix::Error.format(message);
        self.log(LogLevel::Error, &msg);
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        let msg = MessagePrefix::Command.format(command);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        let msg = MessagePrefix::Phase.format(phase_name);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        let msg = MessagePrefix::Success.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Log progress update (filtered in compact mode).
    ///
    /// Returns true if the progress was logged, false if filtered.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            // Only log at step intervals (e.g., 0%, 20%, 40%, ...)
            if let Some(previous) = *last {
                if (percent / step) <= (previous / step) && percent < 100 {
                    return false;
                }
            }
            *last = Some(percent);
        }

        let msg = format!("Progress: {}%", percent);
        self.log(LogLevel::Info, &msg);
        true
    }

    /// Log one line of renderer stdout/stderr.
    ///
    /// In compact mode, lines only go to the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 {
                if buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(line.to_string());
            }
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        let msg = format!("{}{}", prefix, line);
        self.output(&self.format_message(&msg));
    }

    /// Show the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Output a formatted message to file and callback.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = self.line_callback {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Builder for creating JobLogger with fluent API.
pub struct JobLoggerBuilder {
    job_id: String,
    log_dir: PathBuf,
    config: LogConfig,
    line_callback: Option<LineCallback>,
}

impl JobLoggerBuilder {
    /// Create a new builder.
    pub fn new(job_id: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_id: job_id.into(),
            log_dir: log_dir.into(),
            config: LogConfig::default(),
            line_callback: None,
        }
    }

    /// Set the logging configuration.
    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the log level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Enable or disable compact mode.
    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    /// Set the line callback.
    pub fn line_callback(mut self, callback: LineCallback) -> Self {
        self.line_callback = Some(callback);
        self
    }

    /// Build the JobLogger.
    pub fn build(self) -> std::io::Result<JobLogger> {
        JobLogger::new(self.job_id, self.log_dir, self.config, self.line_callback)
    }
}
