use shared::ipc::{Command, Response};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, error, info};

use crate::audio::Microphone;
use crate::state::DaemonState;
use crate::transcription::Transcriber;

pub struct DaemonServer<M: Microphone, T: Transcriber> {
    socket_path: PathBuf,
    state: Arc<DaemonState<M, T>>,
}

impl<M, T> DaemonServer<M, T>
where
    M: Microphone + 'static,
    T: Transcriber + 'static,
{
    pub fn new(socket_path: PathBuf, state: Arc<DaemonState<M, T>>) -> Self {
        Self { socket_path, state }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let socket_path = self.socket_path.clone();

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        info!("Starting socket server at {}", socket_path.display());

        let listener = UnixListener::bind(&socket_path)?;
        debug!("Listener bound successfully");

        loop {
            let state = Arc::clone(&self.state);
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("Connection accepted");
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(state, stream).await {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        state: Arc<DaemonState<M, T>>,
        mut stream: tokio::net::UnixStream,
    ) -> anyhow::Result<()> {
        let mut buffer = vec![0u8; 1024];
        let n = stream.read(&mut buffer).await?;

        if n == 0 {
            return Ok(());
        }

        buffer.truncate(n);

        let command: Command = serde_json::from_slice(&buffer)?;
        info!("Received command: {:?}", command);

        let response = if state.rate_limiter.check() {
            Self::dispatch(&state, command).await
        } else {
            debug!("Command rejected by rate limiter");
            Response::Error("rate limited, try again later".to_string())
        };

        let response_json = serde_json::to_vec(&response)?;
        stream.write_all(&response_json).await?;
        info!("Sent response: {:?}", response);

        Ok(())
    }

    /// Run one command to completion. Failures never propagate past
    /// here: every arm folds its error into a `Response::Error` so the
    /// client always gets a reply and the daemon stays up.
    async fn dispatch(state: &DaemonState<M, T>, command: Command) -> Response {
        match command {
            Command::Capture { timeout_secs } => {
                let timeout = Duration::from_secs(
                    timeout_secs.unwrap_or(state.config.capture.default_timeout_secs),
                );
                match state.listener.try_lock() {
                    Ok(mut listener) => match listener.capture_command(timeout).await {
                        Ok(outcome) => Response::Capture(outcome),
                        Err(e) => {
                            error!("Capture failed: {}", e);
                            Response::Error(format!("capture failed: {}", e))
                        }
                    },
                    Err(_) => Response::Error("listener busy".to_string()),
                }
            }
            Command::Listen => match state.start_listening().await {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error(e.to_string()),
            },
            Command::Stop => match state.stop_listening().await {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error(e.to_string()),
            },
            Command::Calibrate => match state.listener.try_lock() {
                Ok(mut listener) => match listener.calibrate().await {
                    Ok(threshold) => {
                        info!("Recalibrated, threshold now {:.4}", threshold);
                        Response::Ok
                    }
                    Err(e) => {
                        error!("Calibration failed: {}", e);
                        Response::Error(format!("calibration failed: {}", e))
                    }
                },
                Err(_) => Response::Error("listener busy".to_string()),
            },
            Command::Status => Response::Status(state.status().await),
        }
    }
}

impl<M: Microphone, T: Transcriber> Drop for DaemonServer<M, T> {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
