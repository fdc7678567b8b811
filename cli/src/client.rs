use shared::ipc::{self, Command, IpcError, Response, MAX_CAPTURE_TIMEOUT_SECS};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Timeout for connect, write, and ordinary response reads.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time allowed for a capture reply on top of the onset timeout:
/// the daemon's phrase cap plus its recognizer request timeout, with
/// margin.
const CAPTURE_SLACK: Duration = Duration::from_secs(40);

/// Onset timeout the daemon applies when the client sends none.
const DEFAULT_ONSET_TIMEOUT_SECS: u64 = 10;

pub struct DaemonClient {
    socket_path: PathBuf,
}

/// How long to wait for the daemon's reply. A capture legitimately
/// takes the whole onset timeout plus recording plus the recognizer
/// round trip, so it gets a far larger budget than control commands.
/// Oversized onset timeouts are clamped the same way the daemon clamps
/// them, and the slack is added without risking overflow.
fn read_timeout_for(cmd: &Command) -> Duration {
    match cmd {
        Command::Capture { timeout_secs } => {
            let secs = timeout_secs
                .unwrap_or(DEFAULT_ONSET_TIMEOUT_SECS)
                .min(MAX_CAPTURE_TIMEOUT_SECS);
            Duration::from_secs(secs).saturating_add(CAPTURE_SLACK)
        }
        _ => SOCKET_TIMEOUT,
    }
}

impl DaemonClient {
    pub fn new() -> Self {
        Self {
            socket_path: ipc::socket_path(),
        }
    }

    pub async fn send_command(&self, cmd: Command) -> Result<Response, IpcError> {
        let read_timeout = read_timeout_for(&cmd);

        let mut stream = match timeout(SOCKET_TIMEOUT, UnixStream::connect(&self.socket_path)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IpcError::ConnectionRefused);
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(IpcError::ConnectionRefused);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    "Connection timeout: failed to connect to daemon at {} within {:?}",
                    self.socket_path.display(),
                    SOCKET_TIMEOUT
                );
                return Err(IpcError::Timeout);
            }
        };

        let command_json = serde_json::to_vec(&cmd)?;

        if timeout(SOCKET_TIMEOUT, stream.write_all(&command_json))
            .await
            .is_err()
        {
            warn!("Write timeout: failed to send command to daemon within {:?}", SOCKET_TIMEOUT);
            return Err(IpcError::Timeout);
        }

        let mut buffer = vec![0u8; 4096];
        let n = match timeout(read_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    "Read timeout: no response from daemon within {:?}",
                    read_timeout
                );
                return Err(IpcError::Timeout);
            }
        };

        buffer.truncate(n);

        let response: Response = serde_json::from_slice(&buffer)?;

        Ok(response)
    }
}
