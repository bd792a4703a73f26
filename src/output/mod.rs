//! Output formatters for sensor readings.
//!
//! A formatter turns a decoded reading into a broker message: the topic it is
//! published on and the document body.

pub mod json;

use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use crate::tpms::TpmsReading;

/// Upper bound for a rendered document, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// A message ready to hand to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

/// Trait for rendering readings into broker messages.
pub trait OutputFormatter: Send + Sync {
    /// Render a reading for live publishing.
    ///
    /// # Arguments
    /// * `advertisement` - The advertisement the reading was decoded from
    /// * `name` - Display name extracted from the advertisement (may be empty)
    /// * `reading` - The decoded values
    fn format(&self, advertisement: &Advertisement, name: &str, reading: &TpmsReading) -> Message;

    /// Topic for documents replayed from the offline cache.
    fn debug_topic(&self, mac: &MacAddress) -> String;
}
