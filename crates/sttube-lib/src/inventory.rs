//! Descriptor inventory — walk the configuration tree of an open device.

use serde::Serialize;

use crate::descriptor::*;
use crate::device::{Result, StDevice};
use crate::driver::TubeDriver;

/// An endpoint of an alternate setting.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointEntry {
    pub index: u32,
    pub descriptor: EndpointDescriptor,
}

/// One alternate setting with its string and endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AltSettingEntry {
    pub index: u32,
    pub descriptor: InterfaceDescriptor,
    /// `iInterface` string, when present and readable.
    pub name: Option<String>,
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceEntry {
    pub index: u32,
    pub alternates: Vec<AltSettingEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationEntry {
    pub index: u32,
    pub descriptor: ConfigurationDescriptor,
    pub interfaces: Vec<InterfaceEntry>,
}

/// Snapshot of everything the driver reports about a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInventory {
    pub path: String,
    pub device: DeviceDescriptor,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub configurations: Vec<ConfigurationEntry>,
}

impl DeviceInventory {
    /// Walk configurations, interfaces, alternate settings and endpoints using
    /// the counts reported by the driver.
    pub fn collect<D: TubeDriver>(device: &StDevice<'_, D>) -> Result<Self> {
        let desc = device.device_descriptor()?;

        let mut configurations = Vec::new();
        for c in 0..device.nb_of_configurations()? {
            let mut interfaces = Vec::new();
            for i in 0..device.nb_of_interfaces(c)? {
                let mut alternates = Vec::new();
                for a in 0..device.nb_of_alternates(c, i)? {
                    let iface = device.interface_descriptor(c, i, a)?;
                    let endpoints = (0..device.nb_of_endpoints(c, i, a)?)
                        .map(|e| {
                            Ok(EndpointEntry {
                                index: e,
                                descriptor: device.endpoint_descriptor(c, i, a, e)?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    alternates.push(AltSettingEntry {
                        index: a,
                        name: device.optional_string(iface.interface_index),
                        descriptor: iface,
                        endpoints,
                    });
                }
                interfaces.push(InterfaceEntry {
                    index: i,
                    alternates,
                });
            }
            configurations.push(ConfigurationEntry {
                index: c,
                descriptor: device.configuration_descriptor(c)?,
                interfaces,
            });
        }

        Ok(DeviceInventory {
            path: device.path().to_string(),
            manufacturer: device.optional_string(desc.manufacturer_index),
            product: device.optional_string(desc.product_index),
            serial_number: device.optional_string(desc.serial_number_index),
            device: desc,
            configurations,
        })
    }

    /// Total number of alternate settings across all configurations.
    pub fn alt_setting_count(&self) -> usize {
        self.configurations
            .iter()
            .flat_map(|c| &c.interfaces)
            .map(|i| i.alternates.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use crate::driver::mock::{MOCK_PATH, MockDriver};
    use crate::status::StatusCode;

    #[test]
    fn collects_dfu_tree() {
        let driver = MockDriver::new();
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        let inv = DeviceInventory::collect(&dev).unwrap();

        assert_eq!(inv.path, MOCK_PATH);
        assert_eq!(inv.manufacturer.as_deref(), Some("STMicroelectronics"));
        assert_eq!(inv.product.as_deref(), Some("STM32  BOOTLOADER"));
        assert_eq!(inv.serial_number.as_deref(), Some("3574364C3034"));
        assert_eq!(inv.configurations.len(), 1);
        assert_eq!(inv.alt_setting_count(), 4);

        let alts = &inv.configurations[0].interfaces[0].alternates;
        assert_eq!(
            alts[0].name.as_deref(),
            Some("@Internal Flash  /0x08000000/04*016Kg,01*064Kg,07*128Kg")
        );
        assert!(alts.iter().all(|a| a.endpoints.is_empty()));
    }

    #[test]
    fn collects_endpoints() {
        let driver = MockDriver::new().with_bulk_endpoints();
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        let inv = DeviceInventory::collect(&dev).unwrap();

        let eps = &inv.configurations[0].interfaces[0].alternates[0].endpoints;
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].descriptor.endpoint_address, 0x81);
        assert_eq!(eps[1].index, 1);
    }

    #[test]
    fn zero_string_index_is_none() {
        let mut driver = MockDriver::new();
        driver.device.serial_number_index = 0;
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        let inv = DeviceInventory::collect(&dev).unwrap();
        assert!(inv.serial_number.is_none());
        assert!(inv.manufacturer.is_some());
    }

    #[test]
    fn unreadable_string_is_none() {
        let mut driver = MockDriver::new();
        driver.strings.remove(&2);
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        let inv = DeviceInventory::collect(&dev).unwrap();
        assert!(inv.product.is_none());
    }

    #[test]
    fn count_failure_propagates() {
        let driver = MockDriver::new();
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        driver.fail_next(
            "STDevice_GetNbOfAlternates",
            StatusCode::ErrorDescriptorBuilding,
        );
        let err = DeviceInventory::collect(&dev).unwrap_err();
        assert_eq!(
            err,
            DeviceError::Status(StatusCode::ErrorDescriptorBuilding)
        );
    }

    #[test]
    fn serializes_to_json() {
        let driver = MockDriver::new();
        let dev = StDevice::open(&driver, MOCK_PATH).unwrap();
        let inv = DeviceInventory::collect(&dev).unwrap();
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["device"]["vendor_id"], 0x0483);
        assert_eq!(json["manufacturer"], "STMicroelectronics");
        assert_eq!(
            json["configurations"][0]["interfaces"][0]["alternates"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
    }
}
