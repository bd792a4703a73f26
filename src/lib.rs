//! `tpms-mqtt-bridge` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup and
//! process exit codes. Readings are decoded in [`crate::tpms`], routed by
//! [`crate::bridge::Bridge`] and wired to real collaborators in [`crate::app`].

pub mod advertisement;
pub mod app;
pub mod bridge;
pub mod cache;
pub mod duration;
pub mod mac_address;
pub mod mqtt;
pub mod output;
pub mod scanner;
pub mod tpms;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::{Advertisement, extract_name};
pub use bridge::{Bridge, BridgeEvent, FlushReport, Outcome, PublishError, Publisher};
pub use cache::{CACHE_CAPACITY, DeviceCache};
pub use mac_address::MacAddress;
pub use output::json::JsonFormatter;
pub use output::{Message, OutputFormatter};
pub use scanner::{Backend, ScanError};
pub use tpms::{DecodeError, TpmsReading, decode_tpms_payload};
