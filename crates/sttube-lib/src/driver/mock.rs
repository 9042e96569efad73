//! In-memory driver for unit and integration tests.
//!
//! Always compiled (zero runtime cost), hidden from public docs.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;

use super::{RawHandle, TubeDriver};
use crate::control::{
    ControlPipeRequest, DescriptorLevel, DescriptorQuery, Direction, EndpointOperation,
};
use crate::descriptor::*;
use crate::status::StatusCode;

/// Device path the default mock answers to.
pub const MOCK_PATH: &str =
    r"\\?\usb#vid_0483&pid_df11#3574364c3034#{3fe809ab-fb91-4cb5-a643-69670d52366e}";

/// Class/vendor descriptor attached to a node of the mock tree.
#[derive(Debug, Clone)]
pub struct MockClassDescriptor {
    pub descriptor_type: u8,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MockEndpoint {
    pub descriptor: EndpointDescriptor,
    pub class_descriptors: Vec<MockClassDescriptor>,
}

#[derive(Debug, Clone)]
pub struct MockAltSetting {
    pub descriptor: InterfaceDescriptor,
    pub endpoints: Vec<MockEndpoint>,
    pub class_descriptors: Vec<MockClassDescriptor>,
}

#[derive(Debug, Clone)]
pub struct MockInterface {
    pub alternates: Vec<MockAltSetting>,
}

#[derive(Debug, Clone)]
pub struct MockConfiguration {
    pub descriptor: ConfigurationDescriptor,
    pub interfaces: Vec<MockInterface>,
    pub class_descriptors: Vec<MockClassDescriptor>,
}

/// Simulated STTube device and driver.
///
/// Handles are tracked like the real driver: calls on a handle that was never
/// opened (or was closed) answer `STDEVICE_DRIVERISCLOSED`.
pub struct MockDriver {
    /// Path accepted by `open`; anything else answers `STDEVICE_OPENDRIVERERROR`.
    pub path: String,
    pub device: DeviceDescriptor,
    pub configurations: Vec<MockConfiguration>,
    pub strings: HashMap<u32, String>,

    /// Recorded entry point names, in call order.
    pub calls: RefCell<Vec<&'static str>>,
    /// Recorded control requests with the first `length` bytes of their buffer.
    pub control_requests: RefCell<Vec<(ControlPipeRequest, Vec<u8>)>>,
    /// Queued IN data stage responses, one per IN request.
    pub control_responses: RefCell<VecDeque<Vec<u8>>>,
    /// Recorded endpoint control operations.
    pub endpoint_ops: RefCell<Vec<(u32, EndpointOperation)>>,
    pub timeout_ms: Cell<Option<u32>>,
    pub suspend_allowed: Cell<Option<bool>>,
    pub selected: Cell<Option<(u32, u32, u32)>>,
    pub resets: Cell<u32>,
    pub pipes_open: Cell<bool>,

    open_handles: RefCell<HashSet<usize>>,
    next_handle: Cell<usize>,
    failures: RefCell<HashMap<&'static str, u32>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn class_descriptor(descriptor_type: u8, bytes: &[u8]) -> MockClassDescriptor {
    MockClassDescriptor {
        descriptor_type,
        bytes: bytes.to_vec(),
    }
}

/// DFU functional descriptor as reported by the STM32 system bootloader.
pub const DFU_FUNCTIONAL: [u8; 9] = [0x09, 0x21, 0x0B, 0xFF, 0x00, 0x00, 0x08, 0x1A, 0x01];

impl MockDriver {
    /// An STM32 DFU bootloader: one configuration, one interface with four
    /// alternate settings (memory regions), no endpoints besides EP0.
    pub fn new() -> Self {
        let regions = [
            "@Internal Flash  /0x08000000/04*016Kg,01*064Kg,07*128Kg",
            "@Option Bytes  /0x1FFFC000/01*016 e",
            "@OTP Memory /0x1FFF7800/01*512 e,01*016 e",
            "@Device Feature/0xFFFF0000/01*004 e",
        ];
        let mut strings = HashMap::from([
            (1, "STMicroelectronics".to_string()),
            (2, "STM32  BOOTLOADER".to_string()),
            (3, "3574364C3034".to_string()),
        ]);
        let alternates = regions
            .iter()
            .enumerate()
            .map(|(i, region)| {
                let string_index = 4 + i as u8;
                strings.insert(u32::from(string_index), region.to_string());
                MockAltSetting {
                    descriptor: InterfaceDescriptor {
                        length: INTERFACE_DESCRIPTOR_LEN as u8,
                        descriptor_type: DESCRIPTOR_TYPE_INTERFACE,
                        interface_number: 0,
                        alternate_setting: i as u8,
                        num_endpoints: 0,
                        interface_class: 0xFE,
                        interface_subclass: 0x01,
                        interface_protocol: 0x02,
                        interface_index: string_index,
                    },
                    endpoints: Vec::new(),
                    class_descriptors: vec![class_descriptor(0x21, &DFU_FUNCTIONAL)],
                }
            })
            .collect();

        MockDriver {
            path: MOCK_PATH.into(),
            device: DeviceDescriptor {
                length: DEVICE_DESCRIPTOR_LEN as u8,
                descriptor_type: DESCRIPTOR_TYPE_DEVICE,
                bcd_usb: 0x0200,
                device_class: 0,
                device_subclass: 0,
                device_protocol: 0,
                max_packet_size0: 64,
                vendor_id: 0x0483,
                product_id: 0xDF11,
                bcd_device: 0x2200,
                manufacturer_index: 1,
                product_index: 2,
                serial_number_index: 3,
                num_configurations: 1,
            },
            configurations: vec![MockConfiguration {
                descriptor: ConfigurationDescriptor {
                    length: CONFIGURATION_DESCRIPTOR_LEN as u8,
                    descriptor_type: DESCRIPTOR_TYPE_CONFIGURATION,
                    total_length: 0x36,
                    num_interfaces: 1,
                    configuration_value: 1,
                    configuration_index: 0,
                    attributes: 0xC0,
                    max_power: 0x32,
                },
                interfaces: vec![MockInterface { alternates }],
                class_descriptors: Vec::new(),
            }],
            strings,
            calls: RefCell::new(Vec::new()),
            control_requests: RefCell::new(Vec::new()),
            control_responses: RefCell::new(VecDeque::new()),
            endpoint_ops: RefCell::new(Vec::new()),
            timeout_ms: Cell::new(None),
            suspend_allowed: Cell::new(None),
            selected: Cell::new(None),
            resets: Cell::new(0),
            pipes_open: Cell::new(false),
            open_handles: RefCell::new(HashSet::new()),
            next_handle: Cell::new(0x100),
            failures: RefCell::new(HashMap::new()),
        }
    }

    /// Add a bulk IN/OUT endpoint pair to alternate setting 0 of interface 0.
    pub fn with_bulk_endpoints(mut self) -> Self {
        let alt = &mut self.configurations[0].interfaces[0].alternates[0];
        for address in [0x81u8, 0x01] {
            alt.endpoints.push(MockEndpoint {
                descriptor: EndpointDescriptor {
                    length: ENDPOINT_DESCRIPTOR_LEN as u8,
                    descriptor_type: DESCRIPTOR_TYPE_ENDPOINT,
                    endpoint_address: address,
                    attributes: 0x02,
                    max_packet_size: 64,
                    interval: 0,
                },
                class_descriptors: Vec::new(),
            });
        }
        alt.descriptor.num_endpoints = alt.endpoints.len() as u8;
        self
    }

    /// Make the next call to `entry` (e.g. `"STDevice_Reset"`) answer `status`.
    pub fn fail_next(&self, entry: &'static str, status: StatusCode) {
        self.fail_next_code(entry, status.code());
    }

    /// Like [`fail_next`](Self::fail_next) with an arbitrary raw code.
    pub fn fail_next_code(&self, entry: &'static str, code: u32) {
        self.failures.borrow_mut().insert(entry, code);
    }

    /// Queue the data returned by the next IN control request.
    pub fn push_control_response(&self, data: Vec<u8>) {
        self.control_responses.borrow_mut().push_back(data);
    }

    pub fn open_handle_count(&self) -> usize {
        self.open_handles.borrow().len()
    }

    pub fn call_count(&self, entry: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == entry).count()
    }

    /// Record the call and resolve the handle; `Err` carries the status to return.
    fn enter(&self, entry: &'static str, handle: Option<RawHandle>) -> Result<(), u32> {
        self.calls.borrow_mut().push(entry);
        if let Some(code) = self.failures.borrow_mut().remove(entry) {
            return Err(code);
        }
        if let Some(h) = handle
            && !self.open_handles.borrow().contains(&h.0)
        {
            return Err(StatusCode::DriverIsClosed.code());
        }
        Ok(())
    }

    fn configuration(&self, config: u32) -> Result<&MockConfiguration, u32> {
        self.configurations
            .get(config as usize)
            .ok_or(StatusCode::BadParameter.code())
    }

    fn interface(&self, config: u32, interface: u32) -> Result<&MockInterface, u32> {
        self.configuration(config)?
            .interfaces
            .get(interface as usize)
            .ok_or(StatusCode::BadParameter.code())
    }

    fn alternate(&self, config: u32, interface: u32, alt: u32) -> Result<&MockAltSetting, u32> {
        self.interface(config, interface)?
            .alternates
            .get(alt as usize)
            .ok_or(StatusCode::BadParameter.code())
    }

    fn endpoint(
        &self,
        config: u32,
        interface: u32,
        alt: u32,
        endpoint: u32,
    ) -> Result<&MockEndpoint, u32> {
        self.alternate(config, interface, alt)?
            .endpoints
            .get(endpoint as usize)
            .ok_or(StatusCode::BadParameter.code())
    }

    fn class_descriptors(&self, query: &DescriptorQuery) -> Result<Vec<&[u8]>, u32> {
        let list = match query.level {
            DescriptorLevel::Configuration => &self.configuration(query.config)?.class_descriptors,
            DescriptorLevel::InterfaceAltSet => {
                &self
                    .alternate(query.config, query.interface, query.alt_setting)?
                    .class_descriptors
            }
            DescriptorLevel::Endpoint => {
                &self
                    .endpoint(
                        query.config,
                        query.interface,
                        query.alt_setting,
                        query.endpoint,
                    )?
                    .class_descriptors
            }
        };
        Ok(list
            .iter()
            .filter(|d| d.descriptor_type == query.descriptor_type)
            .map(|d| d.bytes.as_slice())
            .collect())
    }
}

fn status<T>(result: Result<T, u32>, apply: impl FnOnce(T)) -> u32 {
    match result {
        Ok(value) => {
            apply(value);
            StatusCode::NoError.code()
        }
        Err(code) => code,
    }
}

fn count_of(result: Result<usize, u32>, count: &mut u32) -> u32 {
    status(result, |n| *count = n as u32)
}

impl TubeDriver for MockDriver {
    fn open(&self, path: &CStr, handle: &mut RawHandle) -> u32 {
        if let Err(code) = self.enter("STDevice_Open", None) {
            return code;
        }
        if path.to_string_lossy() != self.path {
            return StatusCode::OpenDriverError.code();
        }
        let h = self.next_handle.get();
        self.next_handle.set(h + 1);
        self.open_handles.borrow_mut().insert(h);
        *handle = RawHandle(h);
        StatusCode::NoError.code()
    }

    fn close(&self, handle: RawHandle) -> u32 {
        status(self.enter("STDevice_Close", Some(handle)), |_| {
            self.open_handles.borrow_mut().remove(&handle.0);
            self.pipes_open.set(false);
        })
    }

    fn open_pipes(&self, handle: RawHandle) -> u32 {
        let result = self.enter("STDevice_OpenPipes", Some(handle)).and_then(|_| {
            if self.pipes_open.get() {
                Err(StatusCode::PipesAreOpen.code())
            } else {
                Ok(())
            }
        });
        status(result, |_| self.pipes_open.set(true))
    }

    fn close_pipes(&self, handle: RawHandle) -> u32 {
        let result = self.enter("STDevice_ClosePipes", Some(handle)).and_then(|_| {
            if self.pipes_open.get() {
                Ok(())
            } else {
                Err(StatusCode::PipesAreClosed.code())
            }
        });
        status(result, |_| self.pipes_open.set(false))
    }

    fn get_string_descriptor(&self, handle: RawHandle, index: u32, buf: &mut [u8]) -> u32 {
        let result = self
            .enter("STDevice_GetStringDescriptor", Some(handle))
            .and_then(|_| {
                self.strings
                    .get(&index)
                    .ok_or(StatusCode::StringDescriptorError.code())
            });
        status(result, |s| {
            let n = s.len().min(buf.len());
            buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        })
    }

    fn get_device_descriptor(
        &self,
        handle: RawHandle,
        desc: &mut [u8; DEVICE_DESCRIPTOR_LEN],
    ) -> u32 {
        status(
            self.enter("STDevice_GetDeviceDescriptor", Some(handle)),
            |_| *desc = self.device.to_bytes(),
        )
    }

    fn get_nb_of_configurations(&self, handle: RawHandle, count: &mut u32) -> u32 {
        let result = self
            .enter("STDevice_GetNbOfConfigurations", Some(handle))
            .map(|_| self.configurations.len());
        count_of(result, count)
    }

    fn get_configuration_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        desc: &mut [u8; CONFIGURATION_DESCRIPTOR_LEN],
    ) -> u32 {
        let result = self
            .enter("STDevice_GetConfigurationDescriptor", Some(handle))
            .and_then(|_| self.configuration(config));
        status(result, |c| *desc = c.descriptor.to_bytes())
    }

    fn get_nb_of_interfaces(&self, handle: RawHandle, config: u32, count: &mut u32) -> u32 {
        let result = self
            .enter("STDevice_GetNbOfInterfaces", Some(handle))
            .and_then(|_| self.configuration(config))
            .map(|c| c.interfaces.len());
        count_of(result, count)
    }

    fn get_nb_of_alternates(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        count: &mut u32,
    ) -> u32 {
        let result = self
            .enter("STDevice_GetNbOfAlternates", Some(handle))
            .and_then(|_| self.interface(config, interface))
            .map(|i| i.alternates.len());
        count_of(result, count)
    }

    fn get_interface_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        desc: &mut [u8; INTERFACE_DESCRIPTOR_LEN],
    ) -> u32 {
        let result = self
            .enter("STDevice_GetInterfaceDescriptor", Some(handle))
            .and_then(|_| self.alternate(config, interface, alt_setting));
        status(result, |a| *desc = a.descriptor.to_bytes())
    }

    fn get_nb_of_endpoints(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        count: &mut u32,
    ) -> u32 {
        let result = self
            .enter("STDevice_GetNbOfEndPoints", Some(handle))
            .and_then(|_| self.alternate(config, interface, alt_setting))
            .map(|a| a.endpoints.len());
        count_of(result, count)
    }

    fn get_endpoint_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        endpoint: u32,
        desc: &mut [u8; ENDPOINT_DESCRIPTOR_LEN],
    ) -> u32 {
        let result = self
            .enter("STDevice_GetEndPointDescriptor", Some(handle))
            .and_then(|_| self.endpoint(config, interface, alt_setting, endpoint));
        status(result, |e| *desc = e.descriptor.to_bytes())
    }

    fn get_nb_of_descriptors(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        count: &mut u32,
    ) -> u32 {
        let result = self
            .enter("STDevice_GetNbOfDescriptors", Some(handle))
            .and_then(|_| self.class_descriptors(query))
            .map(|list| list.len());
        count_of(result, count)
    }

    fn get_descriptor(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        index: u32,
        buf: &mut [u8],
    ) -> u32 {
        let result = self
            .enter("STDevice_GetDescriptor", Some(handle))
            .and_then(|_| self.class_descriptors(query))
            .and_then(|list| {
                let bytes = list
                    .get(index as usize)
                    .ok_or(StatusCode::DescriptorNotFound.code())?;
                if bytes.len() > buf.len() {
                    return Err(StatusCode::IncorrectBufferSize.code());
                }
                Ok(bytes.to_vec())
            });
        status(result, |bytes| buf[..bytes.len()].copy_from_slice(&bytes))
    }

    fn select_current_configuration(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
    ) -> u32 {
        let result = self
            .enter("STDevice_SelectCurrentConfiguration", Some(handle))
            .and_then(|_| self.alternate(config, interface, alt_setting));
        status(result, |_| {
            self.selected.set(Some((config, interface, alt_setting)))
        })
    }

    fn set_default_timeout(&self, handle: RawHandle, timeout_ms: u32) -> u32 {
        status(
            self.enter("STDevice_SetDefaultTimeOut", Some(handle)),
            |_| self.timeout_ms.set(Some(timeout_ms)),
        )
    }

    fn set_suspend_mode_behaviour(&self, handle: RawHandle, allow: bool) -> u32 {
        status(
            self.enter("STDevice_SetSuspendModeBehaviour", Some(handle)),
            |_| self.suspend_allowed.set(Some(allow)),
        )
    }

    fn endpoint_control(
        &self,
        handle: RawHandle,
        endpoint: u32,
        operation: EndpointOperation,
    ) -> u32 {
        let result = self
            .enter("STDevice_EndPointControl", Some(handle))
            .and_then(|_| {
                if self.pipes_open.get() {
                    Ok(())
                } else {
                    Err(match operation {
                        EndpointOperation::Reset => StatusCode::PipeResetError.code(),
                        EndpointOperation::AbortTransfer => StatusCode::PipeAbortError.code(),
                    })
                }
            });
        status(result, |_| {
            self.endpoint_ops.borrow_mut().push((endpoint, operation))
        })
    }

    fn reset(&self, handle: RawHandle) -> u32 {
        status(self.enter("STDevice_Reset", Some(handle)), |_| {
            self.resets.set(self.resets.get() + 1)
        })
    }

    fn control_pipe_request(
        &self,
        handle: RawHandle,
        request: &ControlPipeRequest,
        data: &mut [u8],
    ) -> u32 {
        if let Err(code) = self.enter("STDevice_ControlPipeRequest", Some(handle)) {
            return code;
        }
        let len = request.length as usize;
        match request.direction {
            Direction::Out => {
                self.control_requests
                    .borrow_mut()
                    .push((*request, data[..len].to_vec()));
            }
            Direction::In => {
                let Some(response) = self.control_responses.borrow_mut().pop_front() else {
                    return StatusCode::VendorRqPb.code();
                };
                let n = response.len().min(len);
                data[..n].copy_from_slice(&response[..n]);
                self.control_requests
                    .borrow_mut()
                    .push((*request, data[..len].to_vec()));
            }
        }
        StatusCode::NoError.code()
    }
}
