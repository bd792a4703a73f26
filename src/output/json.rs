//! Single-line JSON output with a per-device topic.

use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use crate::output::{Message, OutputFormatter};
use crate::tpms::TpmsReading;
use std::fmt;

/// Default topic prefix for published readings.
pub const DEFAULT_TOPIC_PREFIX: &str = "ble/scanner/data";

/// Only this many leading advertisement bytes are copied into `data`.
pub const MAX_DATA_BYTES: usize = 31;

/// JSON formatter.
///
/// Documents have a fixed key order:
/// `mac`, `name`, `data`, `voltage`, `temperature_c`, `pressure_psi`.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    topic_prefix: String,
}

impl JsonFormatter {
    pub fn new(topic_prefix: impl Into<String>) -> Self {
        let mut topic_prefix = topic_prefix.into();
        while topic_prefix.ends_with('/') {
            topic_prefix.pop();
        }
        Self { topic_prefix }
    }

    /// Topic for live readings from `mac`.
    pub fn live_topic(&self, mac: &MacAddress) -> String {
        format!("{}/{}", self.topic_prefix, mac)
    }
}

/// One rendered reading. `Display` writes the single-line JSON document.
pub struct Document<'a> {
    pub advertisement: &'a Advertisement,
    pub name: &'a str,
    pub reading: &'a TpmsReading,
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = &self.advertisement.data;
        let data = &raw[..raw.len().min(MAX_DATA_BYTES)];
        // Value's Display escapes quotes and control bytes
        let name = serde_json::Value::from(self.name);

        write!(
            f,
            "{{\"mac\":\"{}\",\"name\":{},\"data\":\"{}\",\"voltage\":{:.1},\"temperature_c\":{:.1},\"pressure_psi\":{:.2}}}",
            self.advertisement.address,
            name,
            hex::encode_upper(data),
            self.reading.battery_voltage,
            self.reading.temperature_c,
            self.reading.pressure_psi,
        )
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, advertisement: &Advertisement, name: &str, reading: &TpmsReading) -> Message {
        Message {
            topic: self.live_topic(&advertisement.address),
            payload: Document {
                advertisement,
                name,
                reading,
            }
            .to_string(),
        }
    }

    fn debug_topic(&self, mac: &MacAddress) -> String {
        format!("{}/{}/debug", self.topic_prefix, mac)
    }
}
