use crate::audio::{AudioCapture, Microphone};
use crate::config::Config;
use crate::listener::CommandListener;
use crate::rate_limit::CommandRateLimiter;
use crate::transcription::{HttpTranscriber, Transcriber};
use shared::ipc::StatusInfo;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Shared daemon state. The listener sits behind a tokio `Mutex`: the
/// continuous task holds the lock for its whole run, and one-shot
/// commands use `try_lock` so concurrent captures turn into a busy
/// reply instead of a second microphone open.
pub struct DaemonState<M: Microphone, T: Transcriber> {
    pub config: Config,
    pub listener: Arc<Mutex<CommandListener<M, T>>>,
    pub rate_limiter: CommandRateLimiter,
    listen_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    last_command: Arc<std::sync::Mutex<Option<String>>>,
}

impl DaemonState<AudioCapture, HttpTranscriber> {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let microphone = AudioCapture::new(config.audio.sample_rate)?;
        let transcriber = HttpTranscriber::new(&config.recognizer, config.audio.sample_rate)?;
        let listener = CommandListener::new(&config, microphone, transcriber);
        Ok(Self::with_listener(config, listener))
    }
}

impl<M, T> DaemonState<M, T>
where
    M: Microphone + 'static,
    T: Transcriber + 'static,
{
    /// Build state around an existing listener. Tests use this to drive
    /// the lifecycle with scripted microphones.
    pub fn with_listener(config: Config, listener: CommandListener<M, T>) -> Self {
        let rate_limiter = CommandRateLimiter::from_config(&config.rate_limit);

        Self {
            config,
            listener: Arc::new(Mutex::new(listener)),
            rate_limiter,
            listen_task: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            last_command: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub async fn is_listening(&self) -> bool {
        Self::task_is_live(&*self.listen_task.lock().await)
    }

    fn task_is_live(slot: &Option<JoinHandle<()>>) -> bool {
        slot.as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the continuous listening loop. Recognized commands are
    /// recorded as `last_command` for `Status` queries.
    ///
    /// The task slot stays locked from the liveness check through
    /// registration, so racing Listen commands serialize here and
    /// exactly one of them wins.
    pub async fn start_listening(&self) -> anyhow::Result<()> {
        let mut listen_task = self.listen_task.lock().await;
        if Self::task_is_live(&listen_task) {
            anyhow::bail!("already listening");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = Arc::clone(&self.listener);
        let last_command = Arc::clone(&self.last_command);

        let handle = tokio::spawn(async move {
            let mut listener = listener.lock().await;
            let result = listener
                .run_continuous(
                    |text| {
                        tracing::info!("Command recognized: {}", text);
                        *last_command.lock().unwrap() = Some(text.to_string());
                    },
                    shutdown_rx,
                )
                .await;
            if let Err(e) = result {
                tracing::error!("Continuous listening failed: {}", e);
            }
        });

        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        *listen_task = Some(handle);
        tracing::info!("Continuous listening task started");
        Ok(())
    }

    /// Signal the continuous loop to stop. The loop only checks the
    /// signal between captures, so an in-flight capture finishes in the
    /// background rather than blocking this call.
    pub async fn stop_listening(&self) -> anyhow::Result<()> {
        // Same lock order as `start_listening`: the task slot guards the
        // shutdown sender, so a racing Listen can never hand its sender
        // to a Stop aimed at the previous loop.
        let mut listen_task = self.listen_task.lock().await;
        let shutdown_tx = self.shutdown_tx.lock().await.take();
        let handle = listen_task.take();

        if shutdown_tx.is_none() && handle.is_none() {
            anyhow::bail!("not listening");
        }

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(handle) = handle {
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        tracing::error!("Listening task failed: {}", e);
                    }
                }
                tracing::info!("Continuous listening task stopped");
            });
        }
        Ok(())
    }

    pub async fn status(&self) -> StatusInfo {
        StatusInfo {
            is_running: true,
            is_listening: self.is_listening().await,
            last_command: self.last_command.lock().unwrap().clone(),
            language: self.config.recognizer.language.clone(),
        }
    }
}
