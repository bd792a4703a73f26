//! Decoder for the "BR" tire pressure sensor payload.
//!
//! The sensor embeds its reading right after a shortened-name AD record
//! carrying the name `BR`. The record header doubles as the marker:
//!
//! ```text
//! offset  0    1    2    3    4..6   7        8          9..10
//!         0x03 0x08 'B'  'R'  -      battery  temp (°C)  pressure (BE u16)
//! ```

use thiserror::Error;

/// Byte sequence that marks the start of a sensor payload.
pub const MARKER: [u8; 4] = [0x03, 0x08, b'B', b'R'];

/// Bytes needed from the marker position to the last pressure byte.
pub const PAYLOAD_LEN: usize = 11;

/// Raw pressure readings below this value are treated as the sensor floor.
const PRESSURE_FLOOR: u16 = 148;
/// Value substituted for raw readings below [`PRESSURE_FLOOR`].
const PRESSURE_CLAMP: u16 = 146;
const PRESSURE_OFFSET: f32 = 145.0;
const PRESSURE_SCALE: f32 = 145.0;
const PSI_PER_BAR: f32 = 14.5038;

/// A reading decoded from a sensor advertisement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpmsReading {
    /// Battery voltage in Volts
    pub battery_voltage: f32,
    /// Temperature in Celsius
    pub temperature_c: f32,
    /// Gauge pressure in PSI
    pub pressure_psi: f32,
}

/// Reasons an advertisement does not carry a sensor reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("advertisement too short: {0} bytes")]
    TooShort(usize),
    #[error("sensor marker not found")]
    MarkerNotFound,
    #[error("sensor payload at offset {offset} truncated ({len} bytes available)")]
    Truncated { offset: usize, len: usize },
}

/// Find the first occurrence of [`MARKER`] in `payload`.
pub fn find_marker(payload: &[u8]) -> Option<usize> {
    payload
        .windows(MARKER.len())
        .position(|window| window == MARKER)
}

/// Decode a sensor reading from raw advertisement bytes.
///
/// The first marker wins, even if a later one would have enough trailing bytes.
pub fn decode_tpms_payload(payload: &[u8]) -> Result<TpmsReading, DecodeError> {
    let len = payload.len();
    if len < PAYLOAD_LEN {
        return Err(DecodeError::TooShort(len));
    }

    let offset = find_marker(payload).ok_or(DecodeError::MarkerNotFound)?;
    let frame = payload
        .get(offset..offset + PAYLOAD_LEN)
        .ok_or(DecodeError::Truncated { offset, len })?;

    let battery_voltage = f32::from(frame[7]) / 10.0;
    let temperature_c = f32::from(frame[8] as i8);

    let mut raw_pressure = u16::from_be_bytes([frame[9], frame[10]]);
    if raw_pressure < PRESSURE_FLOOR {
        raw_pressure = PRESSURE_CLAMP;
    }
    let pressure_psi =
        ((f32::from(raw_pressure) - PRESSURE_OFFSET) / PRESSURE_SCALE) * PSI_PER_BAR;

    Ok(TpmsReading {
        battery_voltage,
        temperature_c,
        pressure_psi,
    })
}
