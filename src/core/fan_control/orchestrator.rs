//! Poll cycle orchestration.
//!
//! A single coarse tick drives several independent cadences:
//!
//! | cadence  | interval            | work                                   |
//! |----------|---------------------|----------------------------------------|
//! | decision | `poll_s` from config | collect → decide → store → publish    |
//! | history  | 30 s                | append a temperature/duty sample       |
//! | liveness | 5 s                 | probe the actuator over HTTP           |
//! | age      | every tick          | recompute seconds since last update    |
//!
//! Each cadence keeps its own last-fired timestamp and fires on the first tick.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::decision::{decide, DecisionState};
use super::disk_state::{DiskCollector, DiskObservation};
use super::liveness::LivenessProbe;
use super::publisher::{build_messages, Publisher};
use super::store::{CycleReport, RuntimeStore};
use crate::core::config::{Config, ConfigProvider};

pub const TICK: Duration = Duration::from_secs(1);
pub const HISTORY_INTERVAL_S: i64 = 30;
pub const LIVENESS_INTERVAL_S: i64 = 5;

/// Elapsed-time trigger for one cadence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cadence {
    last_fired: Option<i64>,
}

impl Cadence {
    /// Whether `interval_s` has passed since the last firing; records `now` if so.
    pub fn due(&mut self, now: i64, interval_s: i64) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => now - last >= interval_s.max(1),
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }
}

/// The controller's single long-lived task.
pub struct PollLoop {
    config: Arc<dyn ConfigProvider>,
    collector: Arc<DiskCollector>,
    store: Arc<RuntimeStore>,
    publisher: Option<Arc<dyn Publisher>>,
    liveness: Option<LivenessProbe>,
    state: DecisionState,
    last_config: Config,
    decision_cadence: Cadence,
    history_cadence: Cadence,
    liveness_cadence: Cadence,
}

impl PollLoop {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        collector: Arc<DiskCollector>,
        store: Arc<RuntimeStore>,
    ) -> Self {
        Self {
            config,
            collector,
            store,
            publisher: None,
            liveness: None,
            state: DecisionState::default(),
            last_config: Config::default(),
            decision_cadence: Cadence::default(),
            history_cadence: Cadence::default(),
            liveness_cadence: Cadence::default(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_liveness(mut self, probe: LivenessProbe) -> Self {
        self.liveness = Some(probe);
        self
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        log::info!("Poll loop started");

        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    self.tick(now).await;
                }
                _ = shutdown.recv() => {
                    log::info!("Poll loop shutting down");
                    break;
                }
            }
        }
    }

    /// One scheduler tick at wall-clock second `now`.
    pub async fn tick(&mut self, now: i64) {
        let config = self.load_config().await;

        let poll_s = i64::try_from(config.disk_source.poll_s).unwrap_or(i64::MAX);
        if self.decision_cadence.due(now, poll_s) {
            self.run_cycle(&config, now).await;
        }

        if self.history_cadence.due(now, HISTORY_INTERVAL_S) {
            self.store.sample_history(now);
        }

        if config.actuator_ip.is_empty() {
            self.store.set_actuator_online(false);
        } else if self.liveness_cadence.due(now, LIVENESS_INTERVAL_S) {
            if let Some(probe) = &self.liveness {
                let online = probe.is_online(&config.actuator_ip).await;
                self.store.set_actuator_online(online);
            }
        }

        if let Some(publisher) = &self.publisher {
            self.store.set_publisher_connected(publisher.is_connected());
        }

        self.store.refresh_age(now);
    }

    /// Collect, decide, store and publish once.
    pub async fn run_cycle(&mut self, config: &Config, now: i64) -> CycleReport {
        let observation = self.observe(config).await;
        let decision = decide(config, &observation, &mut self.state);

        let report = CycleReport {
            observation,
            decision,
            at: now,
        };
        self.store.publish(&report);

        if let Some(publisher) = &self.publisher {
            if publisher.is_connected() {
                let messages = build_messages(&config.topics, &config.limits, &report);
                if let Err(e) = publisher.publish(&messages) {
                    log::warn!("MQTT publish failed: {}", e);
                }
            }
        }

        log::info!(
            "Update: target_pwm={} mode={} spinning={} max_temp={} ({})",
            report.decision.duty,
            report.decision.mode.as_str(),
            report.observation.spinning_count,
            report
                .observation
                .max_temperature
                .map_or_else(|| "None".to_string(), |t| t.to_string()),
            report.observation.source_tag,
        );

        report
    }

    /// Reading the config file blocks, so it happens off the async workers too.
    async fn load_config(&mut self) -> Config {
        let provider = Arc::clone(&self.config);

        match tokio::task::spawn_blocking(move || provider.snapshot()).await {
            Ok(config) => {
                self.last_config = config.clone();
                config
            }
            Err(e) => {
                log::error!("Config load task failed: {}", e);
                self.last_config.clone()
            }
        }
    }

    /// The collector blocks on file and process I/O, so it runs off the async workers.
    async fn observe(&self, config: &Config) -> DiskObservation {
        let collector = Arc::clone(&self.collector);
        let path = config.disk_source.path.clone();
        let live = config.live_query.clone();

        match tokio::task::spawn_blocking(move || collector.collect(&path, &live)).await {
            Ok(observation) => observation,
            Err(e) => {
                log::error!("Disk collection task failed: {}", e);
                DiskObservation::unavailable()
            }
        }
    }
}
