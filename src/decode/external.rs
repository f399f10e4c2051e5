//! Out-of-process decoder tier.
//!
//! The external decoder is a script run by an interpreter as
//! `<interpreter> <script> <input> <output>`. It writes a rendered image to
//! `<output>` and prints one JSON object to stdout:
//!
//! ```text
//! { "success": bool, "image": "<base64>"?, "metadata": { "Modality": "CT", ... }? }
//! ```
//!
//! A non-zero exit code or non-JSON stdout is a failure. The process is
//! killed if the decode future is dropped or the caller's [`AbortSignal`]
//! fires.
//!
//! Input and output live in [`ScratchFiles`], uniquely named temp files that
//! are removed on every exit path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use tempfile::TempPath;
use tokio::process::Command;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, warn};

use crate::dicom::TagTable;
use crate::error::{IoError, SubprocessError};

/// Random characters in scratch file names.
const SCRATCH_RANDOM_LEN: usize = 8;

/// How long the interpreter probe may run before it is killed.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Abort signal
// =============================================================================

/// Caller-side trigger for an [`AbortSignal`].
#[derive(Debug)]
pub struct AbortHandle {
    sender: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        // Receivers may already be gone
        let _ = self.sender.send(true);
    }
}

/// Cancellation signal passed down with a decode request.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Create a linked handle/signal pair.
    pub fn pair() -> (AbortHandle, AbortSignal) {
        let (sender, receiver) = watch::channel(false);
        (AbortHandle { sender }, AbortSignal { receiver })
    }

    /// Wrap an existing watch channel.
    pub fn from_receiver(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the signal fires. Never resolves if the handle is dropped
    /// without aborting.
    pub async fn aborted(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// =============================================================================
// External output
// =============================================================================

/// JSON object printed by the external decoder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalOutput {
    pub success: bool,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl ExternalOutput {
    /// Parse decoder stdout.
    ///
    /// The whole output should be one JSON object. Scripts that print log
    /// lines first are tolerated by falling back to the last line that parses.
    pub fn parse(stdout: &[u8]) -> Result<Self, SubprocessError> {
        let text = String::from_utf8_lossy(stdout);
        let text = text.trim();
        if text.is_empty() {
            return Err(SubprocessError::MalformedOutput("empty stdout".to_string()));
        }

        match serde_json::from_str(text) {
            Ok(output) => Ok(output),
            Err(e) => text
                .lines()
                .rev()
                .map(str::trim)
                .filter(|line| line.starts_with('{'))
                .find_map(|line| serde_json::from_str(line).ok())
                .ok_or_else(|| SubprocessError::MalformedOutput(e.to_string())),
        }
    }

    /// Decoded `image` field, if present. Accepts a `data:` URL prefix.
    pub fn image_bytes(&self) -> Result<Option<Vec<u8>>, SubprocessError> {
        let Some(image) = self.image.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if image.is_empty() {
            return Ok(None);
        }

        let payload = match image.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => image,
        };
        BASE64
            .decode(payload)
            .map(Some)
            .map_err(|e| SubprocessError::MalformedOutput(format!("image is not base64: {}", e)))
    }

    /// Tag table from the `metadata` object. Non-string scalars are stringified.
    pub fn metadata_table(&self) -> TagTable {
        let pairs = self.metadata.iter().flatten().filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key.as_str(), text))
        });
        TagTable::from_keywords(pairs)
    }
}

// =============================================================================
// ExternalDecoder
// =============================================================================

/// Narrow capability for the out-of-process tier, stubbed in tests.
#[async_trait]
pub trait ExternalDecoder: Send + Sync {
    /// Decode the file at `input`, writing an image to `output`.
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        abort: Option<AbortSignal>,
    ) -> Result<ExternalOutput, SubprocessError>;
}

/// Runs a decoder script through an interpreter.
#[derive(Debug)]
pub struct ProcessDecoder {
    interpreter: String,
    script: Option<PathBuf>,
    available: OnceCell<bool>,
}

impl ProcessDecoder {
    pub fn new(interpreter: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script,
            available: OnceCell::new(),
        }
    }

    /// A decoder that always reports [`SubprocessError::NotConfigured`].
    pub fn disabled() -> Self {
        Self::new("python3", None)
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Probe the interpreter once and cache the answer.
    ///
    /// The interpreter counts as available if it can be spawned at all; the
    /// exit status of `--version` is ignored since shells such as dash reject
    /// the flag.
    ///
    /// # Errors
    /// - `NotConfigured` if there is no script
    /// - `InterpreterMissing` if the interpreter cannot be found or executed
    pub async fn ensure_initialized(&self) -> Result<&Path, SubprocessError> {
        let script = self.script.as_deref().ok_or(SubprocessError::NotConfigured)?;

        let available = *self
            .available
            .get_or_init(|| probe_interpreter(&self.interpreter))
            .await;
        if !available {
            return Err(SubprocessError::InterpreterMissing(self.interpreter.clone()));
        }
        Ok(script)
    }
}

async fn probe_interpreter(interpreter: &str) -> bool {
    let child = Command::new(interpreter)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) if is_missing(&e) => {
            warn!(interpreter, error = %e, "Interpreter not found");
            return false;
        }
        Err(e) => {
            warn!(interpreter, error = %e, "Interpreter probe failed, trying the script anyway");
            return true;
        }
    };

    match tokio::time::timeout(PROBE_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!(interpreter, code = status.code(), "Probed interpreter"),
        Ok(Err(e)) => debug!(interpreter, error = %e, "Interpreter probe did not finish cleanly"),
        Err(_) => debug!(interpreter, "Interpreter probe timed out"),
    }
    true
}

/// Spawn errors that mean the interpreter cannot run at all.
fn is_missing(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::NotFound | ErrorKind::PermissionDenied
    )
}

#[async_trait]
impl ExternalDecoder for ProcessDecoder {
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        abort: Option<AbortSignal>,
    ) -> Result<ExternalOutput, SubprocessError> {
        let script = self.ensure_initialized().await?;

        let child = Command::new(&self.interpreter)
            .arg(script)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if is_missing(&e) {
                    SubprocessError::InterpreterMissing(self.interpreter.clone())
                } else {
                    SubprocessError::Spawn(e.to_string())
                }
            })?;

        debug!(
            interpreter = %self.interpreter,
            script = %script.display(),
            pid = child.id(),
            "Spawned external decoder"
        );

        // Dropping the wait future drops the child, which kills it
        let wait = child.wait_with_output();
        let result = match abort {
            Some(mut signal) => tokio::select! {
                result = wait => result,
                _ = signal.aborted() => return Err(SubprocessError::Aborted),
            },
            None => wait.await,
        };
        let finished = result.map_err(|e| SubprocessError::Spawn(e.to_string()))?;

        if !finished.status.success() {
            return Err(SubprocessError::NonZeroExit {
                code: finished.status.code(),
                stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
            });
        }

        ExternalOutput::parse(&finished.stdout)
    }
}

// =============================================================================
// Scratch files
// =============================================================================

/// Input/output temp file pair for one external decode.
///
/// Names embed a millisecond timestamp and a random suffix so concurrent
/// decodes never collide. Both files are removed when this is dropped;
/// [`ScratchFiles::close`] does the same but logs failures.
#[derive(Debug)]
pub struct ScratchFiles {
    input: TempPath,
    output: TempPath,
}

impl ScratchFiles {
    /// Create `dicom-<millis>-<random>.dcm` and `dicom-<millis>-<random>.png`
    /// in the system temp directory.
    pub fn create() -> Result<Self, IoError> {
        let dir = std::env::temp_dir();
        Ok(Self {
            input: scratch_path(&dir, ".dcm")?,
            output: scratch_path(&dir, ".png")?,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub async fn write_input(&self, bytes: &[u8]) -> Result<(), IoError> {
        tokio::fs::write(&self.input, bytes)
            .await
            .map_err(|e| IoError::Write {
                path: self.input.display().to_string(),
                message: e.to_string(),
            })
    }

    pub async fn read_output(&self) -> Result<Vec<u8>, IoError> {
        tokio::fs::read(&self.output)
            .await
            .map_err(|e| IoError::Read {
                path: self.output.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Remove both files now. Failures are logged, never returned.
    pub fn close(self) {
        for path in [self.input, self.output] {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                warn!(path = %shown, error = %e, "Failed to remove scratch file");
            }
        }
    }
}

fn scratch_path(dir: &Path, suffix: &str) -> Result<TempPath, IoError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let prefix = format!("dicom-{}-", millis);

    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .rand_bytes(SCRATCH_RANDOM_LEN)
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| IoError::TempFile(e.to_string()))
}
