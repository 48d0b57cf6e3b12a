//! CLI-based codec handler using the external codec executable

use super::traits::{Codec, CodecOutcome};
use crate::error::Error;
use crate::types::ConversionMode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Default upper bound on one codec run
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Codec backed by an external executable
///
/// Runs `<binary> <mode> <input> <output>` as a child process, captures both
/// output streams in full, and kills the child if it outlives the timeout.
///
/// # Examples
///
/// ```no_run
/// use ppconv::codec::CliCodec;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// // Create with explicit path
/// let codec = CliCodec::new(PathBuf::from("/opt/codec/compress"))
///     .with_timeout(Duration::from_secs(10));
///
/// // Or auto-discover from PATH
/// let codec = CliCodec::from_path("compress");
/// ```
#[derive(Debug, Clone)]
pub struct CliCodec {
    binary_path: PathBuf,
    timeout: Duration,
}

impl CliCodec {
    /// Create a new CLI codec with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attempt to find the codec binary in PATH
    ///
    /// Uses the `which` crate to search for `binary_name` in the system PATH.
    pub fn from_path(binary_name: &str) -> Option<Self> {
        which::which(binary_name).ok().map(Self::new)
    }

    /// Set the upper bound on a single run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the executable this codec runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Upper bound on a single run
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Codec for CliCodec {
    async fn invoke(
        &self,
        mode: ConversionMode,
        input: &Path,
        output: &Path,
    ) -> crate::Result<CodecOutcome> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg(mode.as_arg())
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group, so workers forked by a wrapper script die with it
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| Error::CodecLaunch {
            executable: self.binary_path.clone(),
            reason: e.to_string(),
        })?;
        // declared after `child` so it drops first when the future is cancelled
        let mut group = ProcessGroup::of(&child);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        let (status, stdout, stderr) = match run {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                group.kill();
                reap(&mut child).await;
                return Err(Error::conversion_failed(format!(
                    "failed to collect codec output: {}",
                    e
                )));
            }
            Err(_) => {
                tracing::warn!(
                    codec = ?self.binary_path,
                    timeout = ?self.timeout,
                    "codec timed out, terminating its process group"
                );
                group.kill();
                reap(&mut child).await;
                return Err(Error::ConversionTimeout {
                    timeout: self.timeout,
                });
            }
        };
        // the leader is reaped; its id may be reused from here on
        group.disarm();

        Ok(CodecOutcome {
            exit_succeeded: status.success(),
            exit_code: status.code(),
            stderr_text: String::from_utf8_lossy(&stderr).into_owned(),
            stdout_text: String::from_utf8_lossy(&stdout).into_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "cli-codec"
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the child (if still running) and wait for it to exit
async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "codec process already gone");
    }
}

/// Process group led by a spawned codec; killed on drop unless disarmed
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    /// SIGKILL every process in the group
    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        if let Ok(pgid) = libc::pid_t::try_from(pgid) {
            // SAFETY: kill(2) takes plain integers and touches no memory
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc != 0 {
                tracing::debug!(
                    pgid,
                    error = %std::io::Error::last_os_error(),
                    "failed to signal codec process group"
                );
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
