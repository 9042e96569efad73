//! Standard USB descriptors (USB 2.0 §9.6).
//!
//! The driver fills packed, little-endian records laid out exactly as on the
//! wire. Each record is decoded field by field from those bytes.

use serde::Serialize;

use crate::device::{DeviceError, Result};

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9;
pub const INTERFACE_DESCRIPTOR_LEN: usize = 9;
pub const ENDPOINT_DESCRIPTOR_LEN: usize = 7;

pub const DESCRIPTOR_TYPE_DEVICE: u8 = 0x01;
pub const DESCRIPTOR_TYPE_CONFIGURATION: u8 = 0x02;
pub const DESCRIPTOR_TYPE_STRING: u8 = 0x03;
pub const DESCRIPTOR_TYPE_INTERFACE: u8 = 0x04;
pub const DESCRIPTOR_TYPE_ENDPOINT: u8 = 0x05;

fn ensure_len(bytes: &[u8], needed: usize, what: &str) -> Result<()> {
    if bytes.len() < needed {
        return Err(DeviceError::Descriptor(format!(
            "{what}: need {needed} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Format a BCD version field (`bcdUSB`, `bcdDevice`) as `major.minor`.
pub fn format_bcd(value: u16) -> String {
    format!("{:x}.{:02x}", value >> 8, value & 0xFF)
}

/// `USB_DEVICE_DESCRIPTOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeviceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub bcd_usb: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, DEVICE_DESCRIPTOR_LEN, "device descriptor")?;
        Ok(DeviceDescriptor {
            length: bytes[0],
            descriptor_type: bytes[1],
            bcd_usb: le16(bytes, 2),
            device_class: bytes[4],
            device_subclass: bytes[5],
            device_protocol: bytes[6],
            max_packet_size0: bytes[7],
            vendor_id: le16(bytes, 8),
            product_id: le16(bytes, 10),
            bcd_device: le16(bytes, 12),
            manufacturer_index: bytes[14],
            product_index: bytes[15],
            serial_number_index: bytes[16],
            num_configurations: bytes[17],
        })
    }

    pub fn to_bytes(&self) -> [u8; DEVICE_DESCRIPTOR_LEN] {
        let mut out = [0u8; DEVICE_DESCRIPTOR_LEN];
        out[0] = self.length;
        out[1] = self.descriptor_type;
        out[2..4].copy_from_slice(&self.bcd_usb.to_le_bytes());
        out[4] = self.device_class;
        out[5] = self.device_subclass;
        out[6] = self.device_protocol;
        out[7] = self.max_packet_size0;
        out[8..10].copy_from_slice(&self.vendor_id.to_le_bytes());
        out[10..12].copy_from_slice(&self.product_id.to_le_bytes());
        out[12..14].copy_from_slice(&self.bcd_device.to_le_bytes());
        out[14] = self.manufacturer_index;
        out[15] = self.product_index;
        out[16] = self.serial_number_index;
        out[17] = self.num_configurations;
        out
    }

    /// USB release number, e.g. `"2.00"`.
    pub fn usb_version(&self) -> String {
        format_bcd(self.bcd_usb)
    }

    /// Device release number, e.g. `"22.00"`.
    pub fn device_version(&self) -> String {
        format_bcd(self.bcd_device)
    }
}

/// `USB_CONFIGURATION_DESCRIPTOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfigurationDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub configuration_index: u8,
    pub attributes: u8,
    /// In 2 mA units.
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(
            bytes,
            CONFIGURATION_DESCRIPTOR_LEN,
            "configuration descriptor",
        )?;
        Ok(ConfigurationDescriptor {
            length: bytes[0],
            descriptor_type: bytes[1],
            total_length: le16(bytes, 2),
            num_interfaces: bytes[4],
            configuration_value: bytes[5],
            configuration_index: bytes[6],
            attributes: bytes[7],
            max_power: bytes[8],
        })
    }

    pub fn to_bytes(&self) -> [u8; CONFIGURATION_DESCRIPTOR_LEN] {
        let mut out = [0u8; CONFIGURATION_DESCRIPTOR_LEN];
        out[0] = self.length;
        out[1] = self.descriptor_type;
        out[2..4].copy_from_slice(&self.total_length.to_le_bytes());
        out[4] = self.num_interfaces;
        out[5] = self.configuration_value;
        out[6] = self.configuration_index;
        out[7] = self.attributes;
        out[8] = self.max_power;
        out
    }

    pub fn self_powered(&self) -> bool {
        self.attributes & 0x40 != 0
    }

    pub fn remote_wakeup(&self) -> bool {
        self.attributes & 0x20 != 0
    }

    pub fn max_power_ma(&self) -> u16 {
        u16::from(self.max_power) * 2
    }
}

/// `USB_INTERFACE_DESCRIPTOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, INTERFACE_DESCRIPTOR_LEN, "interface descriptor")?;
        Ok(InterfaceDescriptor {
            length: bytes[0],
            descriptor_type: bytes[1],
            interface_number: bytes[2],
            alternate_setting: bytes[3],
            num_endpoints: bytes[4],
            interface_class: bytes[5],
            interface_subclass: bytes[6],
            interface_protocol: bytes[7],
            interface_index: bytes[8],
        })
    }

    pub fn to_bytes(&self) -> [u8; INTERFACE_DESCRIPTOR_LEN] {
        [
            self.length,
            self.descriptor_type,
            self.interface_number,
            self.alternate_setting,
            self.num_endpoints,
            self.interface_class,
            self.interface_subclass,
            self.interface_protocol,
            self.interface_index,
        ]
    }
}

/// Transfer type encoded in `bmAttributes` bits 1..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl std::fmt::Display for TransferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferType::Control => "control",
            TransferType::Isochronous => "isochronous",
            TransferType::Bulk => "bulk",
            TransferType::Interrupt => "interrupt",
        };
        f.write_str(name)
    }
}

/// `USB_ENDPOINT_DESCRIPTOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub endpoint_address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, ENDPOINT_DESCRIPTOR_LEN, "endpoint descriptor")?;
        Ok(EndpointDescriptor {
            length: bytes[0],
            descriptor_type: bytes[1],
            endpoint_address: bytes[2],
            attributes: bytes[3],
            max_packet_size: le16(bytes, 4),
            interval: bytes[6],
        })
    }

    pub fn to_bytes(&self) -> [u8; ENDPOINT_DESCRIPTOR_LEN] {
        let mps = self.max_packet_size.to_le_bytes();
        [
            self.length,
            self.descriptor_type,
            self.endpoint_address,
            self.attributes,
            mps[0],
            mps[1],
            self.interval,
        ]
    }

    pub fn number(&self) -> u8 {
        self.endpoint_address & 0x0F
    }

    /// Device-to-host endpoint.
    pub fn is_in(&self) -> bool {
        self.endpoint_address & 0x80 != 0
    }

    pub fn transfer_type(&self) -> TransferType {
        match self.attributes & 0x03 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}
