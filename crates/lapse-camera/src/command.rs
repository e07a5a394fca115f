//! Still capture via an external camera program.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{ANNOTATION_FORMAT, Camera, CameraError};

/// Full sensor resolution of the v2 camera module.
pub const MAX_RESOLUTION: (u32, u32) = (3280, 2464);

/// How a [`CommandCamera`] invokes its capture program.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Program expected to write JPEG bytes to stdout.
    pub program: String,
    /// Argument template; `{width}`, `{height}`, `{warmup_ms}` and
    /// `{annotation}` are substituted at capture time.
    pub args: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Sensor warm-up before the exposure.
    pub warmup: Duration,
    /// Hard limit on one capture; the program is killed past it.
    pub timeout: Duration,
}

impl CaptureSettings {
    /// Settings for `raspistill` (or a flag-compatible program): no preview,
    /// JPEG to stdout, timestamp annotation on a black background.
    pub fn still_command(program: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            program: program.into(),
            args: [
                "-n",
                "-e",
                "jpg",
                "-w",
                "{width}",
                "-h",
                "{height}",
                "-t",
                "{warmup_ms}",
                "-a",
                "1024",
                "-a",
                "{annotation}",
                "-o",
                "-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            width,
            height,
            warmup: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn rendered_args(&self, annotation: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{width}", &self.width.to_string())
                    .replace("{height}", &self.height.to_string())
                    .replace("{warmup_ms}", &self.warmup.as_millis().to_string())
                    .replace("{annotation}", annotation)
            })
            .collect()
    }
}

/// Camera backed by an external still-capture program.
pub struct CommandCamera {
    settings: CaptureSettings,
}

impl CommandCamera {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self) -> Result<Vec<u8>, CameraError> {
        let annotation = Local::now().format(ANNOTATION_FORMAT).to_string();
        let args = self.settings.rendered_args(&annotation);
        debug!(program = %self.settings.program, ?args, "starting capture");

        let mut child = Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CameraError::Spawn {
                program: self.settings.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        // Drain stdout while waiting; a full-resolution frame is far larger
        // than the pipe buffer.
        let capture = async {
            let mut image = Vec::new();
            if let Some(out) = stdout.as_mut() {
                out.read_to_end(&mut image).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, image))
        };

        let captured = timeout(self.settings.timeout, capture).await;
        match captured {
            Ok(Ok((status, image))) => {
                if !status.success() {
                    let mut raw = Vec::new();
                    if let Some(err) = stderr.as_mut() {
                        let _ = err.read_to_end(&mut raw).await;
                    }
                    return Err(CameraError::Failed {
                        status,
                        stderr: String::from_utf8_lossy(&raw).trim().to_string(),
                    });
                }
                if image.is_empty() {
                    return Err(CameraError::EmptyImage);
                }
                info!(bytes = image.len(), "captured frame");
                Ok(image)
            }
            Ok(Err(e)) => Err(CameraError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await; // reap
                Err(CameraError::TimedOut(self.settings.timeout))
            }
        }
    }
}
