//! Bluetooth device address type.
//!
//! Addresses are kept in display order (most significant byte first), which is
//! the reverse of the little-endian order used on the air and in HCI reports.

use std::fmt;

/// A Bluetooth device address stored as 6 bytes in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build an address from over-the-air (little-endian) bytes.
    ///
    /// Byte 5 of `raw` becomes the first octet of the rendered address.
    pub fn from_wire(raw: [u8; 6]) -> Self {
        let mut bytes = raw;
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for MacAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_uppercase_colon_separated() {
        let addr = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x0F]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:0F");
    }

    #[test]
    fn from_wire_reverses_byte_order() {
        let addr = MacAddress::from_wire([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(addr.0, [0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(addr.to_string(), "06:05:04:03:02:01");
    }
}
