//! Raw HCI socket backend.
//!
//! Reads LE advertising reports straight from the kernel, so advertisements
//! arrive byte-for-byte as the sensor sent them. Needs CAP_NET_RAW and
//! CAP_NET_ADMIN (or root) but no bluetoothd.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, ScanError};
use crate::advertisement::Advertisement;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::warn;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;
const HCI_CHANNEL_RAW: u16 = 0;
const HCI_DEV: u16 = 0;

const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;
const EVT_LE_META_EVENT: u8 = 0x3E;
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

/// Largest HCI event: 1 type byte, 2 header bytes, 255 parameter bytes.
const MAX_EVENT_LEN: usize = 258;

/// Offset of the first report inside an LE advertising report event:
/// packet type, event code, parameter length, subevent, report count.
const REPORT_OFFSET: usize = 5;
/// Event type, address type, 6 address bytes, data length.
const REPORT_HEADER_LEN: usize = 9;

#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

#[repr(C)]
#[derive(Default)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    /// Filter passing only LE meta events.
    fn le_meta_events() -> Self {
        let mut filter = Self::default();
        filter.type_mask |= 1 << u32::from(HCI_EVENT_PKT);
        let bit = usize::from(EVT_LE_META_EVENT);
        filter.event_mask[bit / 32] |= 1 << (bit % 32);
        filter
    }
}

fn os_error(context: &str) -> ScanError {
    ScanError::Bluetooth(format!("{context}: {}", io::Error::last_os_error()))
}

/// An open raw HCI socket bound to one controller.
struct HciSocket {
    fd: OwnedFd,
}

impl HciSocket {
    fn open(dev: u16) -> Result<Self, ScanError> {
        // SOCK_NONBLOCK is required for AsyncFd
        let raw = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                SOCK_RAW | SOCK_CLOEXEC | SOCK_NONBLOCK,
                BTPROTO_HCI,
            )
        };
        if raw < 0 {
            return Err(os_error("Failed to create HCI socket"));
        }
        let socket = Self {
            fd: unsafe { OwnedFd::from_raw_fd(raw) },
        };

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as u16,
            hci_dev: dev,
            hci_channel: HCI_CHANNEL_RAW,
        };
        let ret = unsafe {
            libc::bind(
                socket.fd.as_raw_fd(),
                &addr as *const SockaddrHci as *const sockaddr,
                mem::size_of::<SockaddrHci>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(os_error("Failed to bind HCI socket"));
        }

        Ok(socket)
    }

    fn set_filter(&self, filter: &HciFilter) -> Result<(), ScanError> {
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                filter as *const HciFilter as *const c_void,
                mem::size_of::<HciFilter>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(os_error("Failed to set HCI filter"));
        }
        Ok(())
    }

    fn send_command(&self, ogf: u16, ocf: u16, params: &[u8]) -> Result<(), ScanError> {
        let packet = command_packet(ogf, ocf, params);
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                packet.as_ptr() as *const c_void,
                packet.len(),
            )
        };
        if ret < 0 {
            return Err(os_error("Failed to send HCI command"));
        }
        Ok(())
    }

    /// Enable passive LE scanning without duplicate filtering.
    fn enable_passive_scan(&self) -> Result<(), ScanError> {
        // type=passive, interval=window=10ms (0x0010 * 0.625ms), public address, accept all
        let interval = 0x0010u16.to_le_bytes();
        let params = [0x00, interval[0], interval[1], interval[0], interval[1], 0x00, 0x00];
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params)?;
        // enable, do not filter duplicates
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &[0x01, 0x00])
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.fd.as_raw_fd()
    }
}

fn command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = ((ogf << 10) | ocf).to_le_bytes();
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.extend_from_slice(&[HCI_COMMAND_PKT, opcode[0], opcode[1], params.len() as u8]);
    packet.extend_from_slice(params);
    packet
}

/// Extract the first report of an LE advertising report event.
///
/// The address is kept in the over-the-air byte order and converted by
/// [`Advertisement::from_wire`].
fn parse_advertising_report(event: &[u8]) -> Option<Advertisement> {
    if event.len() < REPORT_OFFSET
        || event[0] != HCI_EVENT_PKT
        || event[1] != EVT_LE_META_EVENT
        || event[3] != EVT_LE_ADVERTISING_REPORT
        || event[4] == 0
    {
        return None;
    }

    let report = &event[REPORT_OFFSET..];
    let header = report.get(..REPORT_HEADER_LEN)?;
    let mut address = [0u8; 6];
    address.copy_from_slice(&header[2..8]);
    let data_len = usize::from(header[8]);

    let data = report.get(REPORT_HEADER_LEN..REPORT_HEADER_LEN + data_len)?;
    Some(Advertisement::from_wire(address, data.to_vec()))
}

/// Read one event from the non-blocking socket.
fn read_event(socket: &HciSocket, buf: &mut [u8]) -> io::Result<usize> {
    let ret = unsafe {
        libc::read(
            socket.as_raw_fd(),
            buf.as_mut_ptr() as *mut c_void,
            buf.len(),
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// What to do after a read on the event socket.
#[derive(Debug)]
enum ReadOutcome {
    /// An event of this many bytes is in the buffer
    Event(usize),
    /// Interrupted by a signal; read again
    Retry,
    /// Nothing left to read until the socket signals readiness again
    Idle,
    /// The socket is unusable, e.g. the adapter went away
    Fatal(io::Error),
}

fn classify_read(result: io::Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Idle,
        Ok(n) => ReadOutcome::Event(n),
        Err(e) => match e.kind() {
            io::ErrorKind::Interrupted => ReadOutcome::Retry,
            io::ErrorKind::WouldBlock => ReadOutcome::Idle,
            _ => ReadOutcome::Fatal(e),
        },
    }
}

/// Start scanning with raw HCI sockets on `hci0`.
///
/// One socket receives filtered events; a second one carries the scan
/// commands and is kept open for the lifetime of the reader task.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let events = HciSocket::open(HCI_DEV)?;
    events.set_filter(&HciFilter::le_meta_events())?;

    let commands = HciSocket::open(HCI_DEV)?;
    commands.enable_passive_scan()?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);
    let events = AsyncFd::new(events)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to create async fd: {e}")))?;

    tokio::spawn(async move {
        let _commands = commands;
        let mut buf = [0u8; MAX_EVENT_LEN];

        loop {
            let mut guard = match events.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("HCI socket no longer readable: {e}");
                    break;
                }
            };

            // Drain everything queued before waiting again
            loop {
                let result = match guard.try_io(|inner| read_event(inner.get_ref(), &mut buf)) {
                    Ok(result) => result,
                    Err(_would_block) => break,
                };
                let n = match classify_read(result) {
                    ReadOutcome::Event(n) => n,
                    ReadOutcome::Retry => continue,
                    ReadOutcome::Idle => {
                        guard.clear_ready();
                        break;
                    }
                    ReadOutcome::Fatal(e) => {
                        warn!("HCI read failed, stopping scan: {e}");
                        return;
                    }
                };

                if let Some(advertisement) = parse_advertising_report(&buf[..n])
                    && tx.send(advertisement).await.is_err()
                {
                    return;
                }
            }
        }
    });

    Ok(rx)
}
