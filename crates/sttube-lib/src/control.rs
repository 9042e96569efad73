//! Control pipe requests, endpoint operations and class-descriptor addressing.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// URB function selecting request kind and recipient of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum UrbFunction {
    VendorDevice = 0x0017,
    VendorInterface = 0x0018,
    VendorEndpoint = 0x0019,
    ClassDevice = 0x001A,
    ClassInterface = 0x001B,
    ClassEndpoint = 0x001C,
    ClassOther = 0x001F,
    VendorOther = 0x0020,
}

impl UrbFunction {
    pub const ALL: [UrbFunction; 8] = [
        UrbFunction::VendorDevice,
        UrbFunction::VendorInterface,
        UrbFunction::VendorEndpoint,
        UrbFunction::VendorOther,
        UrbFunction::ClassDevice,
        UrbFunction::ClassInterface,
        UrbFunction::ClassEndpoint,
        UrbFunction::ClassOther,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    fn label(self) -> &'static str {
        match self {
            UrbFunction::VendorDevice => "vendor-device",
            UrbFunction::VendorInterface => "vendor-interface",
            UrbFunction::VendorEndpoint => "vendor-endpoint",
            UrbFunction::VendorOther => "vendor-other",
            UrbFunction::ClassDevice => "class-device",
            UrbFunction::ClassInterface => "class-interface",
            UrbFunction::ClassEndpoint => "class-endpoint",
            UrbFunction::ClassOther => "class-other",
        }
    }
}

impl fmt::Display for UrbFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UrbFunction {
    type Err = String;

    /// Accepts `vendor-device`, `class-interface`, ... (case-insensitive, `_` allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        UrbFunction::ALL
            .into_iter()
            .find(|f| f.label() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = UrbFunction::ALL.iter().map(|f| f.label()).collect();
                format!(
                    "unknown URB function '{s}' (expected one of: {})",
                    names.join(", ")
                )
            })
    }
}

/// Data stage direction of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Host to device (`VENDOR_DIRECTION_OUT`).
    Out,
    /// Device to host (`VENDOR_DIRECTION_IN`).
    In,
}

impl Direction {
    pub fn code(self) -> u32 {
        match self {
            Direction::Out => 0,
            Direction::In => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "out"),
            Direction::In => write!(f, "in"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            _ => Err(format!("unknown direction '{s}' (expected 'in' or 'out')")),
        }
    }
}

/// A USB control transfer on the default pipe.
///
/// The buffer handed to [`StDevice::control_pipe_request`](crate::device::StDevice::control_pipe_request)
/// must hold at least `length` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlPipeRequest {
    pub function: UrbFunction,
    pub direction: Direction,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u32,
}

impl ControlPipeRequest {
    /// Vendor request addressed to the device, the most common form.
    pub fn vendor_device(
        direction: Direction,
        request: u8,
        value: u16,
        index: u16,
        length: u32,
    ) -> Self {
        ControlPipeRequest {
            function: UrbFunction::VendorDevice,
            direction,
            request,
            value,
            index,
            length,
        }
    }
}

/// Operation for `STDevice_EndPointControl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndpointOperation {
    /// `PIPE_RESET`
    Reset,
    /// `ABORT_TRANSFER`
    AbortTransfer,
}

impl EndpointOperation {
    pub fn code(self) -> u32 {
        match self {
            EndpointOperation::Reset => 0,
            EndpointOperation::AbortTransfer => 1,
        }
    }
}

impl fmt::Display for EndpointOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointOperation::Reset => write!(f, "reset"),
            EndpointOperation::AbortTransfer => write!(f, "abort"),
        }
    }
}

impl FromStr for EndpointOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(EndpointOperation::Reset),
            "abort" | "abort-transfer" => Ok(EndpointOperation::AbortTransfer),
            _ => Err(format!(
                "unknown endpoint operation '{s}' (expected 'reset' or 'abort')"
            )),
        }
    }
}

/// Level in the configuration tree at which a class/vendor descriptor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DescriptorLevel {
    Configuration,
    InterfaceAltSet,
    Endpoint,
}

impl DescriptorLevel {
    pub fn code(self) -> u8 {
        match self {
            DescriptorLevel::Configuration => 0,
            DescriptorLevel::InterfaceAltSet => 1,
            DescriptorLevel::Endpoint => 2,
        }
    }
}

/// Addresses non-standard descriptors for `GetNbOfDescriptors` / `GetDescriptor`.
///
/// Indices below `level` are ignored by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DescriptorQuery {
    pub level: DescriptorLevel,
    pub descriptor_type: u8,
    pub config: u32,
    pub interface: u32,
    pub alt_setting: u32,
    pub endpoint: u32,
}

impl DescriptorQuery {
    pub fn configuration(descriptor_type: u8, config: u32) -> Self {
        DescriptorQuery {
            level: DescriptorLevel::Configuration,
            descriptor_type,
            config,
            interface: 0,
            alt_setting: 0,
            endpoint: 0,
        }
    }

    pub fn interface(descriptor_type: u8, config: u32, interface: u32, alt_setting: u32) -> Self {
        DescriptorQuery {
            level: DescriptorLevel::InterfaceAltSet,
            descriptor_type,
            config,
            interface,
            alt_setting,
            endpoint: 0,
        }
    }

    pub fn endpoint(
        descriptor_type: u8,
        config: u32,
        interface: u32,
        alt_setting: u32,
        endpoint: u32,
    ) -> Self {
        DescriptorQuery {
            level: DescriptorLevel::Endpoint,
            descriptor_type,
            config,
            interface,
            alt_setting,
            endpoint,
        }
    }
}
