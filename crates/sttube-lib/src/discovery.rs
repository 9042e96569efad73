//! Device interface discovery — GUID parsing and SetupDi path enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// A device interface class GUID in its registry layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// Interface class registered by the STTube driver for STM32 DFU devices.
pub const STM32_DFU_GUID: InterfaceGuid = InterfaceGuid {
    data1: 0x3FE8_09AB,
    data2: 0xFB91,
    data3: 0x4CB5,
    data4: [0xA6, 0x43, 0x69, 0x67, 0x0D, 0x52, 0x36, 0x6E],
};

impl InterfaceGuid {
    pub fn to_u128(self) -> u128 {
        let mut value = (u128::from(self.data1) << 96)
            | (u128::from(self.data2) << 80)
            | (u128::from(self.data3) << 64);
        for (i, b) in self.data4.iter().enumerate() {
            value |= u128::from(*b) << (56 - 8 * i);
        }
        value
    }

    pub fn from_u128(value: u128) -> Self {
        let mut data4 = [0u8; 8];
        for (i, b) in data4.iter_mut().enumerate() {
            *b = (value >> (56 - 8 * i)) as u8;
        }
        InterfaceGuid {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4,
        }
    }
}

impl fmt::Display for InterfaceGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl FromStr for InterfaceGuid {
    type Err = String;

    /// Accepts `{3fe809ab-fb91-4cb5-a643-69670d52366e}`, braces optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);

        let groups: Vec<&str> = inner.split('-').collect();
        let lengths = [8, 4, 4, 4, 12];
        if groups.len() != lengths.len()
            || groups
                .iter()
                .zip(lengths)
                .any(|(g, len)| g.len() != len || !g.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(format!(
                "invalid GUID '{s}' (expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)"
            ));
        }

        let hex: String = groups.concat();
        let value =
            u128::from_str_radix(&hex, 16).map_err(|e| format!("invalid GUID '{s}': {e}"))?;
        Ok(InterfaceGuid::from_u128(value))
    }
}

impl Serialize for InterfaceGuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A device interface found by [`enumerate_device_paths`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Path accepted by [`StDevice::open`](crate::device::StDevice::open).
    pub path: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// Instance serial (third `#` segment), when the path carries one.
    pub serial: Option<String>,
}

impl DiscoveredDevice {
    /// Extract VID, PID and serial from a USB interface path such as
    /// `\\?\usb#vid_0483&pid_df11#3574364c3034#{...}`.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        let hex_after = |tag: &str| {
            lower
                .find(tag)
                .and_then(|i| lower.get(i + tag.len()..i + tag.len() + 4))
                .and_then(|h| u16::from_str_radix(h, 16).ok())
        };
        let serial = path
            .split('#')
            .nth(2)
            .filter(|s| !s.is_empty() && !s.contains('&'))
            .map(str::to_string);

        DiscoveredDevice {
            path: path.to_string(),
            vendor_id: hex_after("vid_"),
            product_id: hex_after("pid_"),
            serial,
        }
    }
}

/// List every present device exposing the interface class `guid`.
///
/// Always empty on platforms without SetupDi.
pub fn enumerate_device_paths(guid: &InterfaceGuid) -> Vec<DiscoveredDevice> {
    #[cfg(windows)]
    {
        let devices: Vec<DiscoveredDevice> = win_enum::interface_paths(guid)
            .iter()
            .map(|p| DiscoveredDevice::from_path(p))
            .collect();
        log::debug!("{} device(s) found for {guid}", devices.len());
        devices
    }
    #[cfg(not(windows))]
    {
        log::debug!("Device discovery unavailable on this platform ({guid})");
        Vec::new()
    }
}

#[cfg(windows)]
mod win_enum {
    use std::mem;

    use windows::Win32::Devices::DeviceAndDriverInstallation::*;
    use windows::core::{GUID, PCWSTR};

    use super::InterfaceGuid;

    /// Extract a null-terminated UTF-16 path from SP_DEVICE_INTERFACE_DETAIL_DATA_W.
    ///
    /// # Safety
    /// `detail` must point to a valid, fully initialized SP_DEVICE_INTERFACE_DETAIL_DATA_W.
    unsafe fn extract_path(detail: &SP_DEVICE_INTERFACE_DETAIL_DATA_W) -> String {
        let ptr = &detail.DevicePath as *const u16;
        let mut len = 0;
        // SAFETY: caller guarantees `detail` is valid; DevicePath is NUL terminated.
        unsafe {
            while *ptr.add(len) != 0 {
                len += 1;
            }
            String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
        }
    }

    pub fn interface_paths(guid: &InterfaceGuid) -> Vec<String> {
        let guid = GUID::from_u128(guid.to_u128());
        let mut paths = Vec::new();
        // SAFETY: dev_info is destroyed before returning.
        unsafe {
            let Ok(dev_info) = SetupDiGetClassDevsW(
                Some(&guid),
                PCWSTR::null(),
                None,
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            ) else {
                return paths;
            };
            collect_paths(dev_info, &guid, &mut paths);
            let _ = SetupDiDestroyDeviceInfoList(dev_info);
        }
        paths
    }

    unsafe fn collect_paths(dev_info: HDEVINFO, guid: &GUID, paths: &mut Vec<String>) {
        for index in 0.. {
            let mut iface = SP_DEVICE_INTERFACE_DATA {
                cbSize: mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
                ..Default::default()
            };
            // SAFETY: dev_info is a valid handle from SetupDiGetClassDevsW.
            if unsafe { SetupDiEnumDeviceInterfaces(dev_info, None, guid, index, &mut iface) }
                .is_err()
            {
                break;
            }
            let mut req: u32 = 0;
            // SAFETY: first call with NULL buffer to query required size.
            let _ = unsafe {
                SetupDiGetDeviceInterfaceDetailW(dev_info, &iface, None, 0, Some(&mut req), None)
            };
            if req == 0 {
                continue;
            }
            // u32 storage keeps the detail struct aligned
            let mut buf = vec![0u32; (req as usize).div_ceil(4)];
            // SAFETY: buf holds at least req bytes and is 4-byte aligned.
            let detail =
                unsafe { &mut *(buf.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W) };
            detail.cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
            // SAFETY: detail is req bytes long and cbSize is set.
            if unsafe {
                SetupDiGetDeviceInterfaceDetailW(dev_info, &iface, Some(detail), req, None, None)
            }
            .is_ok()
            {
                // SAFETY: detail was just filled by SetupDiGetDeviceInterfaceDetailW.
                paths.push(unsafe { extract_path(detail) });
            }
        }
    }
}
