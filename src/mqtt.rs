//! MQTT broker link.
//!
//! The rumqttc event loop runs in its own task and reports link state changes
//! on a channel; publishing goes through the non-blocking request queue of the
//! client.

use crate::bridge::{PublishError, Publisher};
use crate::duration::parse_duration;
use clap::Args;
use log::{info, warn};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the client request queue; publishes beyond it are rejected.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Buffer for link state notifications.
pub const LINK_CHANNEL_BUFFER_SIZE: usize = 16;

/// Broker connection settings.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Broker host name or address
    #[arg(long = "mqtt-host", env = "MQTT_HOST", default_value = "localhost")]
    pub host: String,

    /// Broker TCP port
    #[arg(long = "mqtt-port", env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    /// MQTT client identifier
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "tpms-bridge")]
    pub client_id: String,

    /// Keep-alive interval. Accepts 500ms, 30s, 1m...
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub keep_alive: Duration,

    /// Pause before reconnecting after a connection error
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub reconnect_delay: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "tpms-bridge".to_string(),
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        // rumqttc rejects sub-second keep-alives
        options.set_keep_alive(self.keep_alive.max(Duration::from_secs(1)));
        options
    }
}

/// Publish capability plus link state notifications.
pub struct Link {
    pub publisher: Box<dyn Publisher>,
    /// `true` when the broker accepted the connection, `false` when it was lost
    pub connectivity: mpsc::Receiver<bool>,
}

/// Publisher backed by the rumqttc request queue.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| PublishError::Rejected(e.to_string()))
    }
}

/// Connect to the broker described by `settings`.
///
/// Must be called from within a tokio runtime. The connection is established
/// in the background; watch [`Link::connectivity`] for the first `true`.
pub fn connect(settings: &MqttSettings) -> Link {
    let (client, eventloop) = AsyncClient::new(settings.options(), REQUEST_QUEUE_CAPACITY);
    let (tx, rx) = mpsc::channel(LINK_CHANNEL_BUFFER_SIZE);

    info!(
        "Connecting to MQTT broker {}:{} as {}",
        settings.host, settings.port, settings.client_id
    );
    tokio::spawn(drive(eventloop, tx, settings.reconnect_delay));

    Link {
        publisher: Box::new(MqttPublisher { client }),
        connectivity: rx,
    }
}

/// Link state implied by an event loop notification, if any.
fn link_state(event: &Event) -> Option<bool> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(ack.code == ConnectReturnCode::Success),
        Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => Some(false),
        _ => None,
    }
}

/// Poll the event loop forever, reporting link changes until the receiver goes away.
async fn drive(mut eventloop: EventLoop, tx: mpsc::Sender<bool>, reconnect_delay: Duration) {
    loop {
        let state = match eventloop.poll().await {
            Ok(event) => link_state(&event),
            Err(e) => {
                warn!("MQTT connection error: {e}");
                Some(false)
            }
        };

        if let Some(up) = state {
            if up {
                info!("MQTT connection accepted");
            }
            if tx.send(up).await.is_err() {
                break;
            }
            if !up {
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::ConnAck;

    #[test]
    fn connack_success_is_link_up() {
        let ack = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(link_state(&ack), Some(true));
    }

    #[test]
    fn refused_connack_is_link_down() {
        let ack = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::NotAuthorized,
            false,
        )));
        assert_eq!(link_state(&ack), Some(false));
    }

    #[test]
    fn disconnect_is_link_down() {
        assert_eq!(link_state(&Event::Outgoing(Outgoing::Disconnect)), Some(false));
        assert_eq!(link_state(&Event::Incoming(Packet::Disconnect)), Some(false));
    }

    #[test]
    fn other_traffic_does_not_change_link() {
        assert_eq!(link_state(&Event::Incoming(Packet::PingResp)), None);
        assert_eq!(link_state(&Event::Outgoing(Outgoing::PingReq)), None);
    }

    #[tokio::test]
    async fn publish_rejected_when_queue_full() {
        let (client, _eventloop) = AsyncClient::new(MqttSettings::default().options(), 1);
        let publisher = MqttPublisher { client };

        assert!(publisher.publish("t", "first").is_ok());
        assert!(matches!(
            publisher.publish("t", "second"),
            Err(PublishError::Rejected(_))
        ));
    }
}
