//! Raw BLE advertisements and AD record parsing.

use crate::mac_address::MacAddress;

/// AD type: shortened local name.
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name.
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Names must be shorter than this to be reported.
pub const MAX_NAME_LEN: usize = 32;

/// A single advertisement as received from the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Source device address
    pub address: MacAddress,
    /// Raw AD structure bytes
    pub data: Vec<u8>,
}

impl Advertisement {
    pub fn new(address: MacAddress, data: Vec<u8>) -> Self {
        Self { address, data }
    }

    /// Build an advertisement from an over-the-air (little-endian) address.
    pub fn from_wire(raw_address: [u8; 6], data: Vec<u8>) -> Self {
        Self::new(MacAddress::from_wire(raw_address), data)
    }

    /// Display name advertised by the device, or an empty string.
    pub fn name(&self) -> String {
        extract_name(&self.data)
    }
}

/// Iterator over `(type, data)` pairs of AD records.
///
/// Stops at a zero-length record or at the end of the buffer. A record whose
/// declared length runs past the buffer yields `Err(())` once and then stops.
pub struct AdRecords<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> AdRecords<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for AdRecords<'a> {
    type Item = Result<(u8, &'a [u8]), ()>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }

        let len = usize::from(self.data[self.offset]);
        if len == 0 {
            self.done = true;
            return None;
        }

        let end = self.offset + 1 + len;
        let Some(record) = self.data.get(self.offset + 1..end) else {
            self.done = true;
            return Some(Err(()));
        };
        self.offset = end;

        Some(Ok((record[0], &record[1..])))
    }
}

/// Recover the device name from raw AD records.
///
/// Returns the first shortened or complete name whose length is in
/// `1..MAX_NAME_LEN`. Scanning stops with an empty result on a corrupt length.
/// The name ends at the first NUL byte; invalid UTF-8 is replaced.
pub fn extract_name(data: &[u8]) -> String {
    for record in AdRecords::new(data) {
        let Ok((ad_type, value)) = record else {
            break;
        };

        let is_name = ad_type == AD_TYPE_SHORT_NAME || ad_type == AD_TYPE_COMPLETE_NAME;
        if is_name && !value.is_empty() && value.len() < MAX_NAME_LEN {
            let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
            return String::from_utf8_lossy(&value[..end]).into_owned();
        }
    }

    String::new()
}

/// Serialize a single AD record. Values longer than 254 bytes are truncated.
pub fn push_record(buf: &mut Vec<u8>, ad_type: u8, value: &[u8]) {
    let value = &value[..value.len().min(254)];
    buf.push(value.len() as u8 + 1);
    buf.push(ad_type);
    buf.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_short_name() {
        let data = [0x02, 0x01, 0x06, 0x03, 0x08, b'B', b'R', 0x05, 0xFF, 1, 2, 3, 4];
        assert_eq!(extract_name(&data), "BR");
    }

    #[test]
    fn first_name_record_wins() {
        let mut data = Vec::new();
        push_record(&mut data, AD_TYPE_COMPLETE_NAME, b"Front Left");
        push_record(&mut data, AD_TYPE_SHORT_NAME, b"FL");
        assert_eq!(extract_name(&data), "Front Left");
    }

    #[test]
    fn empty_without_name_record() {
        let mut data = Vec::new();
        push_record(&mut data, 0x01, &[0x06]);
        push_record(&mut data, AD_TYPE_MANUFACTURER_DATA, &[0x99, 0x04, 0x05]);
        assert_eq!(extract_name(&data), "");
        assert_eq!(extract_name(&[]), "");
    }

    #[test]
    fn overrunning_length_returns_empty() {
        // Second record claims 0x20 bytes but only 3 follow.
        let data = [0x02, 0x01, 0x06, 0x20, 0x09, b'A', b'B'];
        assert_eq!(extract_name(&data), "");

        // Length byte with no type byte after it.
        assert_eq!(extract_name(&[0x05]), "");
    }

    #[test]
    fn zero_length_record_stops_scan() {
        let data = [0x02, 0x01, 0x06, 0x00, 0x03, 0x09, b'N', b'O'];
        assert_eq!(extract_name(&data), "");
    }

    #[test]
    fn skips_names_that_are_empty_or_too_long() {
        let mut data = Vec::new();
        push_record(&mut data, AD_TYPE_SHORT_NAME, b"");
        push_record(&mut data, AD_TYPE_COMPLETE_NAME, &[b'x'; MAX_NAME_LEN]);
        push_record(&mut data, AD_TYPE_SHORT_NAME, b"ok");
        assert_eq!(extract_name(&data), "ok");
    }

    #[test]
    fn name_stops_at_nul() {
        let mut data = Vec::new();
        push_record(&mut data, AD_TYPE_COMPLETE_NAME, b"BR\0\0");
        assert_eq!(extract_name(&data), "BR");
    }

    #[test]
    fn records_iterator_reports_corruption_once() {
        let data = [0x02, 0x01, 0x06, 0x09, 0xFF];
        let records: Vec<_> = AdRecords::new(&data).collect();
        let expected: Vec<Result<(u8, &[u8]), ()>> = vec![Ok((0x01, &[0x06u8][..])), Err(())];
        assert_eq!(records, expected);
    }

    #[test]
    fn advertisement_name_uses_records() {
        let mut data = Vec::new();
        push_record(&mut data, AD_TYPE_SHORT_NAME, b"BR");
        let adv = Advertisement::from_wire([1, 2, 3, 4, 5, 6], data);
        assert_eq!(adv.name(), "BR");
        assert_eq!(adv.address.to_string(), "06:05:04:03:02:01");
    }
}
