//! BlueZ D-Bus backend.
//!
//! BlueZ only exposes parsed device properties, not the advertising PDU, so
//! AD records are rebuilt from the properties: the name as a shortened-name
//! record, followed by one manufacturer-data record per company ID in
//! ascending order. Sensors whose payload lives outside those records are
//! only decodable with the `hci` backend.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, ScanError};
use crate::advertisement::{
    AD_TYPE_MANUFACTURER_DATA, AD_TYPE_SHORT_NAME, Advertisement, MAX_NAME_LEN, push_record,
};
use crate::mac_address::MacAddress;
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start LE discovery on the default adapter.
///
/// Every property change of a discovered device is reported as a fresh
/// advertisement.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let filter = DiscoveryFilter {
        transport: DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {e}");
    }

    let mut events = Box::pin(adapter.discover_devices_with_changes().await?);
    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        let _session = session;

        while let Some(event) = events.next().await {
            let AdapterEvent::DeviceAdded(address) = event else {
                continue;
            };
            match read_advertisement(&adapter, address).await {
                Ok(advertisement) => {
                    if tx.send(advertisement).await.is_err() {
                        break;
                    }
                }
                Err(e) => debug!("Skipping {address}: {e}"),
            }
        }
    });

    Ok(rx)
}

async fn read_advertisement(adapter: &Adapter, address: Address) -> Result<Advertisement, ScanError> {
    let device = adapter.device(address)?;
    let name = device.name().await?;
    let manufacturer_data = device.manufacturer_data().await?;

    Ok(Advertisement::new(
        MacAddress::from(address),
        rebuild_records(name.as_deref(), manufacturer_data.as_ref()),
    ))
}

/// Serialize device properties back into AD records.
fn rebuild_records(name: Option<&str>, manufacturer_data: Option<&HashMap<u16, Vec<u8>>>) -> Vec<u8> {
    let mut data = Vec::new();

    if let Some(name) = name.filter(|n| !n.is_empty() && n.len() < MAX_NAME_LEN) {
        push_record(&mut data, AD_TYPE_SHORT_NAME, name.as_bytes());
    }

    if let Some(manufacturer_data) = manufacturer_data {
        let mut company_ids: Vec<_> = manufacturer_data.keys().copied().collect();
        company_ids.sort_unstable();
        for id in company_ids {
            let mut value = id.to_le_bytes().to_vec();
            value.extend_from_slice(&manufacturer_data[&id]);
            push_record(&mut data, AD_TYPE_MANUFACTURER_DATA, &value);
        }
    }

    data
}
