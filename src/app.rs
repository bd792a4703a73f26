//! Core application runner for `tpms-mqtt-bridge`.
//!
//! Decoupled from CLI parsing, logging setup and process exit codes so the
//! event loop can be tested with injected scanner and broker collaborators.

use crate::advertisement::Advertisement;
use crate::bridge::{Bridge, BridgeEvent, Publisher};
use crate::mqtt::{Link, MqttSettings};
use crate::output::json::{DEFAULT_TOPIC_PREFIX, JsonFormatter};
use crate::scanner::{Backend, ScanError};
use clap::Parser;
use log::info;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// Command-line configuration.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Verbose output, log every cached reading and link event
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Topic prefix; readings go to <prefix>/<MAC> and <prefix>/<MAC>/debug
    #[arg(long, default_value = DEFAULT_TOPIC_PREFIX)]
    pub topic_prefix: String,

    #[command(flatten)]
    pub mqtt: MqttSettings,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>;
}

/// Broker abstraction to enable tests without a running MQTT server.
pub trait Broker: Send + Sync {
    fn connect(&self, settings: &MqttSettings) -> Link;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(backend).await })
    }
}

/// Broker implementation backed by rumqttc.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttBroker;

impl Broker for MqttBroker {
    fn connect(&self, settings: &MqttSettings) -> Link {
        crate::mqtt::connect(settings)
    }
}

/// Feed both event sources into `bridge` until the advertisement stream ends.
///
/// Link changes take priority over advertisements that are ready at the same
/// time. A closed link channel leaves the bridge in its last known state.
pub async fn process_events<P: Publisher>(
    bridge: &mut Bridge<P>,
    mut advertisements: mpsc::Receiver<Advertisement>,
    mut connectivity: mpsc::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            Some(up) = connectivity.recv() => bridge.handle(BridgeEvent::Connectivity(up)),
            advertisement = advertisements.recv() => match advertisement {
                Some(advertisement) => bridge.handle(BridgeEvent::Advertisement(advertisement)),
                None => break,
            },
        }
    }
}

/// Connect to the broker, start scanning and bridge readings until the scanner stops.
pub async fn run_with(
    options: Options,
    scanner: &dyn Scanner,
    broker: &dyn Broker,
) -> Result<(), RunError> {
    let Link {
        publisher,
        connectivity,
    } = broker.connect(&options.mqtt);

    let advertisements = scanner.start_scan(options.backend).await?;
    info!("Scanning with {} backend", options.backend);

    let mut bridge = Bridge::new(publisher, JsonFormatter::new(options.topic_prefix));
    process_events(&mut bridge, advertisements, connectivity).await;

    Ok(())
}
