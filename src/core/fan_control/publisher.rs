//! Outbound publish channel.
//!
//! Once per decision cycle the poll loop hands a flat list of topic/value
//! pairs to a [`Publisher`]. Failures are reported to the caller, which logs
//! them and carries on; the next cycle simply publishes again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;

use super::store::CycleReport;
use crate::core::config::{Limits, MqttSettings, Topics};
use crate::error::{FanError, Result};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 64;

/// A single retained value for the actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    fn new(topic: &str, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.into(),
        }
    }
}

/// Build the messages published after a decision cycle.
///
/// The max temperature is sent with one decimal, or empty when unknown.
pub fn build_messages(topics: &Topics, limits: &Limits, report: &CycleReport) -> Vec<Message> {
    let max_temp = report
        .observation
        .max_temperature
        .map(|t| format!("{:.1}", t))
        .unwrap_or_default();

    vec![
        Message::new(&topics.target_pwm, report.decision.duty.to_string()),
        Message::new(&topics.min_pwm, limits.min_duty.to_string()),
        Message::new(&topics.max_pwm, limits.max_duty.to_string()),
        Message::new(&topics.bias_limit, limits.bias_limit.to_string()),
        Message::new(&topics.spinning_disks, report.observation.spinning_count.to_string()),
        Message::new(&topics.updated_at, report.at.to_string()),
        Message::new(&topics.max_temp, max_temp),
    ]
}

/// Sink for decision results.
pub trait Publisher: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `messages` for delivery. Must not block.
    fn publish(&self, messages: &[Message]) -> Result<()>;
}

/// MQTT publisher with retained QoS 0 messages.
///
/// The client reconnects on its own; a background task drives the event loop
/// and tracks whether the broker accepted the connection.
pub struct MqttPublisher {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop on the current runtime.
    pub fn spawn(settings: &MqttSettings, shutdown: broadcast::Receiver<()>) -> Self {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_keep_alive(KEEP_ALIVE);
        if !settings.username.is_empty() {
            options.set_credentials(settings.username.clone(), settings.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        log::info!("MQTT: connecting to {}:{}", settings.host, settings.port);
        tokio::spawn(drive_event_loop(eventloop, Arc::clone(&connected), shutdown));

        Self { client, connected }
    }
}

impl Publisher for MqttPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&self, messages: &[Message]) -> Result<()> {
        for message in messages {
            self.client
                .try_publish(
                    message.topic.clone(),
                    QoS::AtMostOnce,
                    true,
                    message.payload.clone().into_bytes(),
                )
                .map_err(|e| FanError::publish(format!("{}: {}", message.topic, e)))?;
        }
        Ok(())
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut failing = false;

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let accepted = ack.code == ConnectReturnCode::Success;
                    connected.store(accepted, Ordering::Relaxed);
                    if accepted {
                        failing = false;
                        log::info!("MQTT: Connected successfully");
                    } else {
                        log::warn!("MQTT: Connection refused ({:?})", ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    connected.store(false, Ordering::Relaxed);
                    log::warn!("MQTT: Disconnected by broker");
                }
                Ok(_) => {}
                Err(e) => {
                    connected.store(false, Ordering::Relaxed);
                    if !failing {
                        log::warn!("MQTT: connection error: {}", e);
                        failing = true;
                    } else {
                        log::debug!("MQTT: still unreachable: {}", e);
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
            _ = shutdown.recv() => {
                connected.store(false, Ordering::Relaxed);
                break;
            }
        }
    }
}
