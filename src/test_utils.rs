use crate::advertisement::{AD_TYPE_COMPLETE_NAME, Advertisement, push_record};
use crate::bridge::{PublishError, Publisher};
use crate::mac_address::MacAddress;
use crate::tpms::MARKER;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Build an 11-byte sensor frame starting with the marker.
pub fn sensor_frame(battery_decivolts: u8, temperature_c: i8, raw_pressure: u16) -> Vec<u8> {
    let mut frame = MARKER.to_vec();
    frame.extend_from_slice(&[0x00, 0x00, 0x00]);
    frame.push(battery_decivolts);
    frame.push(temperature_c as u8);
    frame.extend_from_slice(&raw_pressure.to_be_bytes());
    frame
}

/// Advertisement whose only name is the `BR` carried by the frame marker.
pub fn br_advertisement(mac: MacAddress, frame: Vec<u8>) -> Advertisement {
    let mut data = vec![0x02, 0x01, 0x06];
    data.extend(frame);
    Advertisement::new(mac, data)
}

/// Advertisement with a complete-name record ahead of the frame.
pub fn named_advertisement(mac: MacAddress, name: &str, frame: Vec<u8>) -> Advertisement {
    let mut data = Vec::new();
    push_record(&mut data, AD_TYPE_COMPLETE_NAME, name.as_bytes());
    data.extend(frame);
    Advertisement::new(mac, data)
}

/// Publisher that records accepted messages and can reject on demand.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// bridge.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, String)>>>,
    reject: Arc<AtomicUsize>,
}

impl RecordingPublisher {
    /// Accepted `(topic, payload)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Reject the next `count` publish calls.
    pub fn reject_next(&self, count: usize) {
        self.reject.store(count, Ordering::SeqCst);
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let rejected = self
            .reject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(PublishError::Rejected("request queue full".into()));
        }

        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
