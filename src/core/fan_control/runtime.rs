//! Tokio runtime hosting the controller.
//!
//! Owns the worker threads, the shutdown channel and every long-lived task:
//! the poll loop, the MQTT event loop and (optionally) the status API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::disk_state::DiskCollector;
use super::liveness::LivenessProbe;
use super::orchestrator::PollLoop;
use super::publisher::{MqttPublisher, Publisher};
use super::store::RuntimeStore;
use crate::core::config::{ConfigProvider, FileConfigProvider};
use crate::logging::LogBuffer;
use crate::server::{run_server, StatusState};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub config_path: PathBuf,
    /// Overrides `status.bind` from the config file.
    pub bind: Option<String>,
    pub serve_status: bool,
}

pub struct ControllerRuntime {
    pub store: Arc<RuntimeStore>,
    shutdown_tx: broadcast::Sender<()>,
    runtime: tokio::runtime::Runtime,
}

impl ControllerRuntime {
    /// Build the runtime and spawn all tasks.
    pub fn start(options: RuntimeOptions, logs: LogBuffer) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("spinfan-worker")
            .build()?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let provider = Arc::new(FileConfigProvider::new(options.config_path));
        let initial = provider.snapshot();
        log::info!("Using config {}", provider.path().display());

        let store = Arc::new(RuntimeStore::new());
        let collector = Arc::new(DiskCollector::with_smartctl(&initial.live_query.command));
        let liveness = LivenessProbe::new()?;

        // The MQTT client spawns its event loop, so it needs the runtime context.
        let publisher: Arc<dyn Publisher> = {
            let _guard = runtime.enter();
            Arc::new(MqttPublisher::spawn(&initial.mqtt, shutdown_tx.subscribe()))
        };

        let poll_loop = PollLoop::new(provider, collector, Arc::clone(&store))
            .with_publisher(publisher)
            .with_liveness(liveness);
        runtime.spawn(poll_loop.run(shutdown_tx.subscribe()));

        if options.serve_status {
            let bind = options.bind.unwrap_or(initial.status.bind);
            let state = StatusState {
                store: Arc::clone(&store),
                logs,
            };
            let shutdown = shutdown_tx.subscribe();
            runtime.spawn(async move {
                if let Err(e) = run_server(&bind, state, shutdown).await {
                    log::error!("Status API stopped: {}", e);
                }
            });
        }

        Ok(Self {
            store,
            shutdown_tx,
            runtime,
        })
    }

    /// Block the calling thread until Ctrl-C or SIGTERM.
    pub fn wait_for_shutdown_signal(&self) -> anyhow::Result<()> {
        self.runtime.block_on(shutdown_signal())
    }

    pub fn shutdown(self) {
        log::info!("Shutting down");
        let _ = self.shutdown_tx.send(());
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
