//! Serial device discovery
//!
//! Finds the microcontroller among the serial ports the OS reports, first by
//! port description and then by USB vendor id.

use crate::config::{TEENSY_VENDOR_ID, USB_SERIAL_DESCRIPTION};
use serialport::SerialPortType;
use std::fmt;

/// A candidate serial endpoint as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// System device path (`/dev/ttyACM0`, `COM3`, ...)
    pub path: String,
    /// Human-readable description
    pub description: String,
    /// USB vendor id, absent for non-USB ports
    pub vendor_id: Option<u16>,
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.path, self.description)
    }
}

impl From<serialport::SerialPortInfo> for PortDescriptor {
    fn from(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                description: usb
                    .product
                    .or(usb.manufacturer)
                    .unwrap_or_else(|| "n/a".to_string()),
                vendor_id: Some(usb.vid),
                path: info.port_name,
            },
            _ => Self {
                path: info.port_name,
                description: "n/a".to_string(),
                vendor_id: None,
            },
        }
    }
}

/// Source of the OS port table
pub trait PortEnumerator {
    fn ports(&self) -> Vec<PortDescriptor>;
}

/// Port table backed by `serialport::available_ports`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> Vec<PortDescriptor> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(PortDescriptor::from).collect(),
            Err(e) => {
                tracing::warn!("port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// How the selected port was recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// Sole port described as a USB-serial controller
    Description,
    /// Chosen by the operator among several described ports
    OperatorChoice,
    /// First port carrying the Teensy vendor id
    VendorId {
        /// No port was described as a USB-serial controller
        after_description_miss: bool,
    },
}

/// Outcome of a search over one port table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSearch {
    Found {
        port: PortDescriptor,
        method: MatchMethod,
    },
    /// Several ports are described as USB-serial controllers
    Ambiguous {
        candidates: Vec<PortDescriptor>,
        ports: Vec<PortDescriptor>,
    },
    /// Nothing matched; the full table is kept for the operator
    NotFound { ports: Vec<PortDescriptor> },
}

fn is_usb_serial(port: &PortDescriptor) -> bool {
    port.description.contains(USB_SERIAL_DESCRIPTION)
}

/// Search a port table by description, then by vendor id
pub fn search(ports: Vec<PortDescriptor>) -> DeviceSearch {
    let mut described: Vec<PortDescriptor> =
        ports.iter().filter(|p| is_usb_serial(p)).cloned().collect();
    tracing::debug!(ports = ports.len(), described = described.len(), "searching port table");

    match described.len() {
        0 => search_by_vendor(ports, true),
        1 => DeviceSearch::Found {
            port: described.remove(0),
            method: MatchMethod::Description,
        },
        _ => DeviceSearch::Ambiguous {
            candidates: described,
            ports,
        },
    }
}

fn first_vendor_match(ports: &[PortDescriptor]) -> Option<PortDescriptor> {
    ports
        .iter()
        .find(|p| p.vendor_id == Some(TEENSY_VENDOR_ID))
        .cloned()
}

/// Vendor-id pass: first port, in enumeration order, with the Teensy vendor id
pub fn search_by_vendor(ports: Vec<PortDescriptor>, after_description_miss: bool) -> DeviceSearch {
    match first_vendor_match(&ports) {
        Some(port) => DeviceSearch::Found {
            port,
            method: MatchMethod::VendorId {
                after_description_miss,
            },
        },
        None => DeviceSearch::NotFound { ports },
    }
}

/// Final outcome once any ambiguity has been settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        port: PortDescriptor,
        method: MatchMethod,
    },
    NotFound {
        ports: Vec<PortDescriptor>,
        /// Described ports were offered to the operator and declined
        declined: Vec<PortDescriptor>,
    },
}

/// Resolve an ambiguous search with an operator's choice
///
/// `choose` receives the described candidates and returns an index into them.
/// Declining (or an out-of-range index) falls back to the vendor-id pass over
/// the whole table.
pub fn resolve<F>(search: DeviceSearch, choose: F) -> Resolution
where
    F: FnOnce(&[PortDescriptor]) -> Option<usize>,
{
    match search {
        DeviceSearch::Found { port, method } => Resolution::Found { port, method },
        DeviceSearch::NotFound { ports } => Resolution::NotFound {
            ports,
            declined: Vec::new(),
        },
        DeviceSearch::Ambiguous { candidates, ports } => {
            if let Some(port) = choose(&candidates).and_then(|i| candidates.get(i).cloned()) {
                return Resolution::Found {
                    port,
                    method: MatchMethod::OperatorChoice,
                };
            }
            tracing::debug!(candidates = candidates.len(), "operator declined, trying vendor id");
            match first_vendor_match(&ports) {
                Some(port) => Resolution::Found {
                    port,
                    method: MatchMethod::VendorId {
                        after_description_miss: false,
                    },
                },
                None => Resolution::NotFound {
                    ports,
                    declined: candidates,
                },
            }
        }
    }
}

/// Locate the microcontroller, or `None` when nothing matches
pub fn find_device<E, F>(enumerator: &E, choose: F) -> Option<PortDescriptor>
where
    E: PortEnumerator,
    F: FnOnce(&[PortDescriptor]) -> Option<usize>,
{
    match resolve(search(enumerator.ports()), choose) {
        Resolution::Found { port, method } => {
            tracing::info!(port = %port.path, ?method, "device found");
            Some(port)
        }
        Resolution::NotFound { .. } => None,
    }
}
