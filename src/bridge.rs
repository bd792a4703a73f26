//! Connectivity-aware bridging between advertisements and the broker.
//!
//! [`Bridge`] owns the device cache and the link state. Every event goes
//! through `&mut self`, so the processing loop that owns the bridge is the only
//! place either is ever read or changed.

use crate::advertisement::Advertisement;
use crate::cache::DeviceCache;
use crate::output::OutputFormatter;
use crate::tpms::{DecodeError, decode_tpms_payload};
use log::{debug, info, warn};
use thiserror::Error;

/// Only readings from devices advertising exactly this name are cached while
/// the link is down.
pub const CACHEABLE_NAME: &str = "BR";

/// A publish request was not accepted for transmission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Outbound publish capability.
///
/// `Ok(())` means the message was accepted for transmission, not that the
/// broker received it.
pub trait Publisher: Send {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        (**self).publish(topic, payload)
    }
}

/// Events consumed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Advertisement(Advertisement),
    Connectivity(bool),
}

/// What happened to a single advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No sensor reading in the advertisement
    Ignored(DecodeError),
    /// Published on the live topic
    Published,
    /// Link up but the publish was rejected; not retried
    PublishFailed(PublishError),
    /// Link down; stored for the next reconnect
    Cached,
    /// Link down and the device is not cacheable
    Dropped,
}

/// Result of replaying the cache after the link came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub published: usize,
    pub retained: usize,
}

/// Decides whether each reading is published, cached or dropped.
pub struct Bridge<P> {
    publisher: P,
    formatter: Box<dyn OutputFormatter>,
    cache: DeviceCache,
    connected: bool,
}

impl<P: Publisher> Bridge<P> {
    /// Create a bridge that starts with the link down and an empty cache.
    pub fn new(publisher: P, formatter: impl OutputFormatter + 'static) -> Self {
        Self::with_cache(publisher, formatter, DeviceCache::new())
    }

    pub fn with_cache(
        publisher: P,
        formatter: impl OutputFormatter + 'static,
        cache: DeviceCache,
    ) -> Self {
        Self {
            publisher,
            formatter: Box::new(formatter),
            cache,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn cache(&self) -> &DeviceCache {
        &self.cache
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Apply one event.
    pub fn handle(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Advertisement(advertisement) => {
                self.on_advertisement(&advertisement);
            }
            BridgeEvent::Connectivity(up) => {
                self.on_connectivity_changed(up);
            }
        }
    }

    /// Decode an advertisement and publish, cache or drop the reading.
    pub fn on_advertisement(&mut self, advertisement: &Advertisement) -> Outcome {
        let reading = match decode_tpms_payload(&advertisement.data) {
            Ok(reading) => reading,
            Err(e) => return Outcome::Ignored(e),
        };

        let name = advertisement.name();
        let message = self.formatter.format(advertisement, &name, &reading);

        if self.connected {
            return match self.publisher.publish(&message.topic, &message.payload) {
                Ok(()) => Outcome::Published,
                Err(e) => {
                    warn!("Dropping reading for {}: {e}", advertisement.address);
                    Outcome::PublishFailed(e)
                }
            };
        }

        if name == CACHEABLE_NAME {
            self.cache.upsert(advertisement.address, message.payload);
            debug!("Link down, cached reading for {}", advertisement.address);
            Outcome::Cached
        } else {
            Outcome::Dropped
        }
    }

    /// Record a link state change. Returns a report only on a down-to-up edge.
    pub fn on_connectivity_changed(&mut self, up: bool) -> Option<FlushReport> {
        if up == self.connected {
            return None;
        }
        self.connected = up;

        if !up {
            info!("Broker link down, caching readings");
            return None;
        }

        info!("Broker link up");
        Some(self.flush_cache())
    }

    /// Replay cached documents on their debug topics.
    fn flush_cache(&mut self) -> FlushReport {
        let publisher = &self.publisher;
        let formatter = &self.formatter;

        let published = self.cache.drain_accepted(|address, payload| {
            match publisher.publish(&formatter.debug_topic(address), payload) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Keeping cached reading for {address}: {e}");
                    false
                }
            }
        });

        let report = FlushReport {
            published,
            retained: self.cache.len(),
        };
        if report.published > 0 || report.retained > 0 {
            info!(
                "Flushed {} cached readings, {} retained",
                report.published, report.retained
            );
        }
        report
    }
}
