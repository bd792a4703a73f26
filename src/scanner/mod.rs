//! BLE advertisement sources.
//!
//! Each backend delivers raw advertisements on a channel. Decoding happens in
//! the bridge, so backends stay unaware of the sensor format.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use crate::advertisement::Advertisement;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner startup.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// Backend not available (not compiled in)
    #[error("Backend '{0}' not available (not compiled in)")]
    BackendNotAvailable(String),
}

/// Channel buffer size for advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Raw HCI socket backend (byte-exact advertisements, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
    /// BlueZ D-Bus backend (requires bluetoothd; records rebuilt from properties)
    #[cfg(feature = "bluer")]
    Bluer,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "hci")]
        return Backend::Hci;
        #[cfg(all(feature = "bluer", not(feature = "hci")))]
        return Backend::Bluer;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            _ => Err(format!("Unknown backend: {s}")),
        }
    }
}

/// Start delivering advertisements from the given backend.
///
/// The returned receiver yields every advertisement seen on the default
/// adapter until the backend task stops.
pub async fn start_scan(backend: Backend) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    match backend {
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan().await,
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn backend_from_str() {
        #[cfg(feature = "hci")]
        {
            assert_eq!(Backend::from_str("hci").unwrap(), Backend::Hci);
            assert_eq!(Backend::from_str("RAW").unwrap(), Backend::Hci);
        }
        #[cfg(feature = "bluer")]
        {
            assert_eq!(Backend::from_str("bluer").unwrap(), Backend::Bluer);
            assert_eq!(Backend::from_str("bluez").unwrap(), Backend::Bluer);
        }
        assert!(Backend::from_str("usb").is_err());
    }

    #[test]
    fn backend_display_round_trips() {
        let backends = [
            #[cfg(feature = "hci")]
            Backend::Hci,
            #[cfg(feature = "bluer")]
            Backend::Bluer,
        ];
        for backend in backends {
            assert_eq!(Backend::from_str(&backend.to_string()).unwrap(), backend);
        }
    }

    #[cfg(feature = "hci")]
    #[test]
    fn default_backend_is_hci() {
        assert_eq!(Backend::default(), Backend::Hci);
    }

    #[cfg(all(feature = "bluer", not(feature = "hci")))]
    #[test]
    fn default_backend_falls_back_to_bluer() {
        assert_eq!(Backend::default(), Backend::Bluer);
    }

    #[cfg(not(feature = "bluer"))]
    #[test]
    fn bluer_backend_is_unknown_without_feature() {
        assert!(Backend::from_str("bluer").is_err());
    }

    #[test]
    fn scan_error_display() {
        let err = ScanError::Bluetooth("adapter not found".to_string());
        assert_eq!(err.to_string(), "Bluetooth error: adapter not found");
    }
}
