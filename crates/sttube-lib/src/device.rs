//! Device handle wrapper — typed access to an opened STTube device.

use std::ffi::CString;
use std::fmt;

use log::debug;

use crate::config::Config;
use crate::control::{ControlPipeRequest, DescriptorQuery, Direction, EndpointOperation};
use crate::descriptor::*;
use crate::discovery::{self, InterfaceGuid};
use crate::driver::{RawHandle, STRING_BUFFER_LEN, TubeDriver};
use crate::status::StatusCode;

// ── Error type ──

/// Device communication errors.
///
/// `Status` and `Unknown` carry what the driver reported; every other variant
/// is detected locally before or after the native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A failure status from the table.
    Status(StatusCode),
    /// A status outside the table, raw value preserved.
    Unknown(u32),
    /// Control request buffer shorter than the request's `length`.
    BufferTooSmall { required: usize, actual: usize },
    InvalidPath(String),
    /// The vendor library could not be loaded or lacks an entry point.
    Library(String),
    /// Discovery found no device for the interface GUID.
    NotFound,
    /// A descriptor record could not be decoded.
    Descriptor(String),
}

impl DeviceError {
    /// The driver status behind this error, if it came from the driver.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeviceError::Status(s) => Some(*s),
            _ => None,
        }
    }

    /// The raw driver code, for both table and unknown statuses.
    pub fn code(&self) -> Option<u32> {
        match self {
            DeviceError::Status(s) => Some(s.code()),
            DeviceError::Unknown(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Status(s) => write!(f, "{s}"),
            DeviceError::Unknown(code) => write!(f, "Unknown device error (0x{code:08X})"),
            DeviceError::BufferTooSmall { required, actual } => write!(
                f,
                "Data buffer too small: request length is {required} bytes, buffer holds {actual}"
            ),
            DeviceError::InvalidPath(e) => write!(f, "Invalid device path: {e}"),
            DeviceError::Library(e) => write!(f, "Failed to load driver library: {e}"),
            DeviceError::NotFound => write!(f, "No STTube device found"),
            DeviceError::Descriptor(e) => write!(f, "Malformed descriptor: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Translate a raw driver status.
pub fn check(code: u32) -> Result<()> {
    match StatusCode::from_code(code) {
        Some(StatusCode::NoError) => Ok(()),
        Some(status) => Err(DeviceError::Status(status)),
        None => Err(DeviceError::Unknown(code)),
    }
}

/// Bytes up to the last non-NUL byte.
fn trim_nul(buf: &[u8]) -> &[u8] {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &buf[..end]
}

// ── Handle wrapper ──

/// An open device handle.
///
/// Every operation checks the open flag first and fails with
/// `STDEVICE_DRIVERISCLOSED` once [`close`](Self::close) has been called.
/// Dropping an open device closes it.
pub struct StDevice<'d, D: TubeDriver> {
    driver: &'d D,
    handle: RawHandle,
    path: String,
    open: bool,
}

impl<'d, D: TubeDriver> StDevice<'d, D> {
    /// Open the device at `path` (a device interface path, usually from discovery).
    pub fn open(driver: &'d D, path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(DeviceError::InvalidPath("path is empty".into()));
        }
        let c_path = CString::new(path)
            .map_err(|_| DeviceError::InvalidPath(format!("{path:?} contains a NUL byte")))?;

        let mut handle = RawHandle::default();
        check(driver.open(&c_path, &mut handle))?;
        debug!("Opened {path}");

        Ok(StDevice {
            driver,
            handle,
            path: path.to_string(),
            open: true,
        })
    }

    /// Open the first device exposing the interface class `guid`.
    pub fn open_first(driver: &'d D, guid: &InterfaceGuid) -> Result<Self> {
        let devices = discovery::enumerate_device_paths(guid);
        let first = devices.first().ok_or(DeviceError::NotFound)?;
        Self::open(driver, &first.path)
    }

    /// Open the device selected by `config`: its explicit path, or the first
    /// one discovered for its GUID. Configured timeout and suspend behaviour
    /// are applied before returning.
    pub fn open_configured(driver: &'d D, config: &Config) -> crate::error::Result<Self> {
        let device = if config.device_path.trim().is_empty() {
            Self::open_first(driver, &config.guid()?)?
        } else {
            Self::open(driver, config.device_path.trim())?
        };
        device.apply_config(config)?;
        Ok(device)
    }

    /// Apply the device settings of `config` to this handle.
    pub fn apply_config(&self, config: &Config) -> Result<()> {
        if config.default_timeout_ms > 0 {
            debug!("Default timeout: {} ms", config.default_timeout_ms);
            self.set_default_timeout(config.default_timeout_ms)?;
        }
        if let Some(allow) = config.allow_suspend {
            debug!("Suspend allowed: {allow}");
            self.set_suspend_mode_behaviour(allow)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn handle(&self) -> Result<RawHandle> {
        if !self.open {
            return Err(DeviceError::Status(StatusCode::DriverIsClosed));
        }
        Ok(self.handle)
    }

    /// Release the native handle. The device is considered closed even if the
    /// driver reports a failure.
    pub fn close(&mut self) -> Result<()> {
        let handle = self.handle()?;
        self.open = false;
        debug!("Closing {}", self.path);
        check(self.driver.close(handle))
    }

    pub fn open_pipes(&self) -> Result<()> {
        check(self.driver.open_pipes(self.handle()?))
    }

    pub fn close_pipes(&self) -> Result<()> {
        check(self.driver.close_pipes(self.handle()?))
    }

    /// Read string descriptor `index` (e.g. `iManufacturer`), NUL padding removed.
    pub fn string_descriptor(&self, index: u32) -> Result<String> {
        let handle = self.handle()?;
        let mut buf = [0u8; STRING_BUFFER_LEN];
        check(self.driver.get_string_descriptor(handle, index, &mut buf))?;
        Ok(String::from_utf8_lossy(trim_nul(&buf)).into_owned())
    }

    /// String descriptor referenced by a descriptor's string-index field.
    ///
    /// `None` for index 0 ("no string") or when the read fails.
    pub fn optional_string(&self, index: u8) -> Option<String> {
        if index == 0 {
            return None;
        }
        match self.string_descriptor(u32::from(index)) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!("String descriptor {index}: {e}");
                None
            }
        }
    }

    pub fn device_descriptor(&self) -> Result<DeviceDescriptor> {
        let handle = self.handle()?;
        let mut buf = [0u8; DEVICE_DESCRIPTOR_LEN];
        check(self.driver.get_device_descriptor(handle, &mut buf))?;
        DeviceDescriptor::from_bytes(&buf)
    }

    pub fn nb_of_configurations(&self) -> Result<u32> {
        let handle = self.handle()?;
        let mut count = 0;
        check(self.driver.get_nb_of_configurations(handle, &mut count))?;
        Ok(count)
    }

    pub fn configuration_descriptor(&self, config: u32) -> Result<ConfigurationDescriptor> {
        let handle = self.handle()?;
        let mut buf = [0u8; CONFIGURATION_DESCRIPTOR_LEN];
        check(
            self.driver
                .get_configuration_descriptor(handle, config, &mut buf),
        )?;
        ConfigurationDescriptor::from_bytes(&buf)
    }

    pub fn nb_of_interfaces(&self, config: u32) -> Result<u32> {
        let handle = self.handle()?;
        let mut count = 0;
        check(self.driver.get_nb_of_interfaces(handle, config, &mut count))?;
        Ok(count)
    }

    pub fn nb_of_alternates(&self, config: u32, interface: u32) -> Result<u32> {
        let handle = self.handle()?;
        let mut count = 0;
        check(
            self.driver
                .get_nb_of_alternates(handle, config, interface, &mut count),
        )?;
        Ok(count)
    }

    pub fn interface_descriptor(
        &self,
        config: u32,
        interface: u32,
        alt_setting: u32,
    ) -> Result<InterfaceDescriptor> {
        let handle = self.handle()?;
        let mut buf = [0u8; INTERFACE_DESCRIPTOR_LEN];
        check(self.driver.get_interface_descriptor(
            handle,
            config,
            interface,
            alt_setting,
            &mut buf,
        ))?;
        InterfaceDescriptor::from_bytes(&buf)
    }

    pub fn nb_of_endpoints(&self, config: u32, interface: u32, alt_setting: u32) -> Result<u32> {
        let handle = self.handle()?;
        let mut count = 0;
        check(self.driver.get_nb_of_endpoints(
            handle,
            config,
            interface,
            alt_setting,
            &mut count,
        ))?;
        Ok(count)
    }

    pub fn endpoint_descriptor(
        &self,
        config: u32,
        interface: u32,
        alt_setting: u32,
        endpoint: u32,
    ) -> Result<EndpointDescriptor> {
        let handle = self.handle()?;
        let mut buf = [0u8; ENDPOINT_DESCRIPTOR_LEN];
        check(self.driver.get_endpoint_descriptor(
            handle,
            config,
            interface,
            alt_setting,
            endpoint,
            &mut buf,
        ))?;
        EndpointDescriptor::from_bytes(&buf)
    }

    /// Number of class/vendor descriptors of `query.descriptor_type` at `query`'s level.
    pub fn nb_of_descriptors(&self, query: &DescriptorQuery) -> Result<u32> {
        let handle = self.handle()?;
        let mut count = 0;
        check(self.driver.get_nb_of_descriptors(handle, query, &mut count))?;
        Ok(count)
    }

    /// Raw bytes of the `index`-th class/vendor descriptor matching `query`.
    ///
    /// The driver fills a zeroed 512-byte buffer. The result is the first
    /// `bLength` bytes of that buffer, whatever the driver actually wrote, so a
    /// record shorter than its `bLength` comes back zero-padded. A zero
    /// `bLength` falls back to trimming trailing NUL padding.
    pub fn descriptor(&self, query: &DescriptorQuery, index: u32) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let mut buf = [0u8; STRING_BUFFER_LEN];
        check(self.driver.get_descriptor(handle, query, index, &mut buf))?;
        let declared = buf[0] as usize;
        if declared > 0 && declared <= buf.len() {
            Ok(buf[..declared].to_vec())
        } else {
            Ok(trim_nul(&buf).to_vec())
        }
    }

    /// [`descriptor`](Self::descriptor) read as text, trailing NUL padding removed.
    pub fn descriptor_string(&self, query: &DescriptorQuery, index: u32) -> Result<String> {
        let handle = self.handle()?;
        let mut buf = [0u8; STRING_BUFFER_LEN];
        check(self.driver.get_descriptor(handle, query, index, &mut buf))?;
        Ok(String::from_utf8_lossy(trim_nul(&buf)).into_owned())
    }

    pub fn select_current_configuration(
        &self,
        config: u32,
        interface: u32,
        alt_setting: u32,
    ) -> Result<()> {
        let handle = self.handle()?;
        check(
            self.driver
                .select_current_configuration(handle, config, interface, alt_setting),
        )
    }

    /// Driver-internal transfer timeout; does not cancel calls in flight.
    pub fn set_default_timeout(&self, timeout_ms: u32) -> Result<()> {
        check(self.driver.set_default_timeout(self.handle()?, timeout_ms))
    }

    pub fn set_suspend_mode_behaviour(&self, allow: bool) -> Result<()> {
        check(
            self.driver
                .set_suspend_mode_behaviour(self.handle()?, allow),
        )
    }

    pub fn endpoint_control(&self, endpoint: u32, operation: EndpointOperation) -> Result<()> {
        check(
            self.driver
                .endpoint_control(self.handle()?, endpoint, operation),
        )
    }

    pub fn reset(&self) -> Result<()> {
        check(self.driver.reset(self.handle()?))
    }

    /// Issue a control transfer. `data` is filled for IN requests and sent for
    /// OUT requests; it must hold at least `request.length` bytes.
    pub fn control_pipe_request(
        &self,
        request: &ControlPipeRequest,
        data: &mut [u8],
    ) -> Result<()> {
        let handle = self.handle()?;
        let required = request.length as usize;
        if data.len() < required {
            return Err(DeviceError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        check(self.driver.control_pipe_request(handle, request, data))
    }

    /// IN control transfer into a freshly allocated buffer of `request.length` bytes.
    pub fn read_control(&self, request: &ControlPipeRequest) -> Result<Vec<u8>> {
        let mut data = vec![0u8; request.length as usize];
        let request = ControlPipeRequest {
            direction: Direction::In,
            ..*request
        };
        self.control_pipe_request(&request, &mut data)?;
        Ok(data)
    }

    /// OUT control transfer sending all of `data`.
    pub fn write_control(&self, request: &ControlPipeRequest, data: &[u8]) -> Result<()> {
        let mut buf = data.to_vec();
        let request = ControlPipeRequest {
            direction: Direction::Out,
            length: data.len() as u32,
            ..*request
        };
        self.control_pipe_request(&request, &mut buf)
    }
}

impl<D: TubeDriver> Drop for StDevice<'_, D> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            let _ = check(self.driver.close(self.handle));
            debug!("Closed {} on drop", self.path);
        }
    }
}

impl<D: TubeDriver> fmt::Debug for StDevice<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StDevice")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::UrbFunction;
    use crate::driver::mock::{DFU_FUNCTIONAL, MOCK_PATH, MockClassDescriptor, MockDriver};
    use crate::status::STDEVICE_ERROR_OFFSET;

    fn open(driver: &MockDriver) -> StDevice<'_, MockDriver> {
        StDevice::open(driver, MOCK_PATH).unwrap()
    }

    // ── Status translation ──

    #[test]
    fn check_no_error_is_ok() {
        assert!(check(StatusCode::NoError.code()).is_ok());
    }

    #[test]
    fn check_maps_every_failure_code() {
        for status in StatusCode::ALL.into_iter().skip(1) {
            let err = check(status.code()).unwrap_err();
            assert_eq!(err, DeviceError::Status(status));
            assert_eq!(err.to_string(), status.message());
        }
    }

    #[test]
    fn check_unknown_code_keeps_raw_value() {
        let err = check(0xDEAD_BEEF).unwrap_err();
        assert_eq!(err, DeviceError::Unknown(0xDEAD_BEEF));
        assert_eq!(err.code(), Some(0xDEAD_BEEF));
        assert!(err.status().is_none());
        assert_eq!(err.to_string(), "Unknown device error (0xDEADBEEF)");
    }

    // ── Open / close ──

    #[test]
    fn open_nonexistent_path_is_open_driver_error() {
        let driver = MockDriver::new();
        let err = StDevice::open(&driver, r"\\?\usb#vid_dead&pid_beef#nothing").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::OpenDriverError));
        assert_eq!(driver.open_handle_count(), 0);
    }

    #[test]
    fn open_empty_path_fails_locally() {
        let driver = MockDriver::new();
        let err = StDevice::open(&driver, "").unwrap_err();
        assert!(matches!(err, DeviceError::InvalidPath(_)));
        assert_eq!(driver.call_count("STDevice_Open"), 0);
    }

    #[test]
    fn open_path_with_nul_fails_locally() {
        let driver = MockDriver::new();
        let err = StDevice::open(&driver, "abc\0def").unwrap_err();
        assert!(matches!(err, DeviceError::InvalidPath(_)));
        assert_eq!(driver.call_count("STDevice_Open"), 0);
    }

    #[test]
    fn open_then_close_succeeds() {
        let driver = MockDriver::new();
        let mut dev = open(&driver);
        assert!(dev.is_open());
        assert_eq!(dev.path(), MOCK_PATH);
        dev.close().unwrap();
        assert!(!dev.is_open());
        assert_eq!(driver.open_handle_count(), 0);
    }

    #[test]
    fn operations_after_close_fail_with_driver_closed() {
        let driver = MockDriver::new();
        let mut dev = open(&driver);
        dev.close().unwrap();
        let calls_before = driver.calls.borrow().len();

        let closed = Some(StatusCode::DriverIsClosed);
        assert_eq!(dev.device_descriptor().unwrap_err().status(), closed);
        assert_eq!(dev.string_descriptor(1).unwrap_err().status(), closed);
        assert_eq!(dev.nb_of_configurations().unwrap_err().status(), closed);
        assert_eq!(dev.reset().unwrap_err().status(), closed);
        assert_eq!(dev.open_pipes().unwrap_err().status(), closed);
        assert_eq!(dev.close().unwrap_err().status(), closed);

        // Failed fast: nothing reached the driver
        assert_eq!(driver.calls.borrow().len(), calls_before);
    }

    #[test]
    fn close_failure_still_marks_closed() {
        let driver = MockDriver::new();
        let mut dev = open(&driver);
        driver.fail_next("STDevice_Close", StatusCode::Memory);
        assert_eq!(dev.close().unwrap_err().status(), Some(StatusCode::Memory));
        assert!(!dev.is_open());
    }

    #[test]
    fn drop_closes_open_handle() {
        let driver = MockDriver::new();
        {
            let _dev = open(&driver);
            assert_eq!(driver.open_handle_count(), 1);
        }
        assert_eq!(driver.open_handle_count(), 0);
        assert_eq!(driver.call_count("STDevice_Close"), 1);
    }

    #[test]
    fn drop_after_close_does_not_close_twice() {
        let driver = MockDriver::new();
        let mut dev = open(&driver);
        dev.close().unwrap();
        drop(dev);
        assert_eq!(driver.call_count("STDevice_Close"), 1);
    }

    #[test]
    fn two_handles_are_independent() {
        let driver = MockDriver::new();
        let mut a = open(&driver);
        let b = open(&driver);
        a.close().unwrap();
        assert!(b.device_descriptor().is_ok());
    }

    // ── Descriptors ──

    #[test]
    fn device_descriptor_has_standard_length() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let desc = dev.device_descriptor().unwrap();
        assert_eq!(desc.length as usize, DEVICE_DESCRIPTOR_LEN);
        assert_eq!(desc.descriptor_type, DESCRIPTOR_TYPE_DEVICE);
        assert_eq!(desc.vendor_id, 0x0483);
        assert_eq!(desc.product_id, 0xDF11);
    }

    #[test]
    fn device_descriptor_failure_is_reported() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.fail_next("STDevice_GetDeviceDescriptor", StatusCode::DescriptorNotFound);
        assert_eq!(
            dev.device_descriptor().unwrap_err().status(),
            Some(StatusCode::DescriptorNotFound)
        );
    }

    #[test]
    fn string_descriptor_has_no_trailing_nul() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let desc = dev.device_descriptor().unwrap();
        let manufacturer = dev
            .string_descriptor(u32::from(desc.manufacturer_index))
            .unwrap();
        assert_eq!(manufacturer, "STMicroelectronics");
        assert!(!manufacturer.ends_with('\0'));
    }

    #[test]
    fn string_descriptor_keeps_interior_spaces() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        assert_eq!(dev.string_descriptor(2).unwrap(), "STM32  BOOTLOADER");
    }

    #[test]
    fn string_descriptor_missing_index() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        assert_eq!(
            dev.string_descriptor(99).unwrap_err().status(),
            Some(StatusCode::StringDescriptorError)
        );
    }

    #[test]
    fn optional_string_skips_zero_and_failed_reads() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        assert_eq!(dev.optional_string(1).as_deref(), Some("STMicroelectronics"));
        assert_eq!(dev.optional_string(0), None);
        assert_eq!(driver.call_count("STDevice_GetStringDescriptor"), 1);
        driver.fail_next(
            "STDevice_GetStringDescriptor",
            StatusCode::StringDescriptorError,
        );
        assert_eq!(dev.optional_string(2), None);
    }

    #[test]
    fn string_descriptor_truncates_to_buffer() {
        let mut driver = MockDriver::new();
        driver.strings.insert(9, "x".repeat(600));
        let dev = open(&driver);
        assert_eq!(dev.string_descriptor(9).unwrap().len(), STRING_BUFFER_LEN);
    }

    #[test]
    fn configuration_tree_counts() {
        let driver = MockDriver::new().with_bulk_endpoints();
        let dev = open(&driver);
        assert_eq!(dev.nb_of_configurations().unwrap(), 1);
        assert_eq!(dev.nb_of_interfaces(0).unwrap(), 1);
        assert_eq!(dev.nb_of_alternates(0, 0).unwrap(), 4);
        assert_eq!(dev.nb_of_endpoints(0, 0, 0).unwrap(), 2);
        assert_eq!(dev.nb_of_endpoints(0, 0, 1).unwrap(), 0);
    }

    #[test]
    fn out_of_range_indices_are_bad_parameter() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let bad = Some(StatusCode::BadParameter);
        assert_eq!(dev.nb_of_interfaces(1).unwrap_err().status(), bad);
        assert_eq!(dev.nb_of_alternates(0, 1).unwrap_err().status(), bad);
        assert_eq!(dev.nb_of_endpoints(0, 0, 4).unwrap_err().status(), bad);
        assert_eq!(
            dev.select_current_configuration(0, 0, 7).unwrap_err().status(),
            bad
        );
    }

    #[test]
    fn configuration_and_interface_descriptors() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let config = dev.configuration_descriptor(0).unwrap();
        assert_eq!(config.descriptor_type, DESCRIPTOR_TYPE_CONFIGURATION);
        assert_eq!(config.num_interfaces, 1);

        let iface = dev.interface_descriptor(0, 0, 1).unwrap();
        assert_eq!(iface.alternate_setting, 1);
        assert_eq!(iface.interface_class, 0xFE);
        assert_eq!(
            dev.string_descriptor(u32::from(iface.interface_index))
                .unwrap(),
            "@Option Bytes  /0x1FFFC000/01*016 e"
        );
    }

    #[test]
    fn endpoint_descriptor_decodes() {
        let driver = MockDriver::new().with_bulk_endpoints();
        let dev = open(&driver);
        let ep = dev.endpoint_descriptor(0, 0, 0, 0).unwrap();
        assert_eq!(ep.endpoint_address, 0x81);
        assert!(ep.is_in());
        assert_eq!(ep.transfer_type(), TransferType::Bulk);
    }

    #[test]
    fn class_descriptor_cut_to_length() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let query = DescriptorQuery::interface(0x21, 0, 0, 0);
        assert_eq!(dev.nb_of_descriptors(&query).unwrap(), 1);
        assert_eq!(dev.descriptor(&query, 0).unwrap(), DFU_FUNCTIONAL.to_vec());
    }

    #[test]
    fn class_descriptor_missing_index() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let query = DescriptorQuery::interface(0x21, 0, 0, 0);
        assert_eq!(
            dev.descriptor(&query, 1).unwrap_err().status(),
            Some(StatusCode::DescriptorNotFound)
        );
    }

    #[test]
    fn class_descriptor_oversized_is_incorrect_buffer_size() {
        let mut driver = MockDriver::new();
        let mut bytes = vec![0u8; 600];
        bytes[1] = 0x30;
        driver.configurations[0]
            .class_descriptors
            .push(MockClassDescriptor {
                descriptor_type: 0x30,
                bytes,
            });
        let dev = open(&driver);
        let query = DescriptorQuery::configuration(0x30, 0);
        assert_eq!(dev.nb_of_descriptors(&query).unwrap(), 1);
        assert_eq!(
            dev.descriptor(&query, 0).unwrap_err(),
            DeviceError::Status(StatusCode::IncorrectBufferSize)
        );
    }

    #[test]
    fn class_descriptor_shorter_than_length_is_zero_padded() {
        let mut driver = MockDriver::new();
        driver.configurations[0]
            .class_descriptors
            .push(MockClassDescriptor {
                descriptor_type: 0x30,
                bytes: vec![0x20, 0x30, 0x01],
            });
        let dev = open(&driver);
        let bytes = dev
            .descriptor(&DescriptorQuery::configuration(0x30, 0), 0)
            .unwrap();
        assert_eq!(bytes.len(), 0x20);
        assert_eq!(&bytes[..3], &[0x20, 0x30, 0x01]);
        assert!(bytes[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn class_descriptor_other_type_counts_zero() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let query = DescriptorQuery::configuration(0x21, 0);
        assert_eq!(dev.nb_of_descriptors(&query).unwrap(), 0);
    }

    // ── Configuration / control ──

    #[test]
    fn select_configuration_reaches_driver() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        dev.select_current_configuration(0, 0, 3).unwrap();
        assert_eq!(driver.selected.get(), Some((0, 0, 3)));
    }

    #[test]
    fn timeout_and_suspend_reach_driver() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        dev.set_default_timeout(2500).unwrap();
        dev.set_suspend_mode_behaviour(false).unwrap();
        assert_eq!(driver.timeout_ms.get(), Some(2500));
        assert_eq!(driver.suspend_allowed.get(), Some(false));
    }

    #[test]
    fn suspend_failure_is_reported() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.fail_next(
            "STDevice_SetSuspendModeBehaviour",
            StatusCode::CantUseUnplugEvent,
        );
        assert_eq!(
            dev.set_suspend_mode_behaviour(true).unwrap_err().status(),
            Some(StatusCode::CantUseUnplugEvent)
        );
    }

    #[test]
    fn pipes_open_and_close() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        dev.open_pipes().unwrap();
        assert_eq!(
            dev.open_pipes().unwrap_err().status(),
            Some(StatusCode::PipesAreOpen)
        );
        dev.close_pipes().unwrap();
        assert_eq!(
            dev.close_pipes().unwrap_err().status(),
            Some(StatusCode::PipesAreClosed)
        );
    }

    #[test]
    fn pipe_creation_failure_is_reported() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.fail_next("STDevice_OpenPipes", StatusCode::PipeCreationError);
        assert_eq!(
            dev.open_pipes().unwrap_err(),
            DeviceError::Status(StatusCode::PipeCreationError)
        );
        assert!(!driver.pipes_open.get());
        dev.open_pipes().unwrap();
        assert!(driver.pipes_open.get());
    }

    #[test]
    fn endpoint_control_requires_open_pipes() {
        let driver = MockDriver::new().with_bulk_endpoints();
        let dev = open(&driver);
        assert_eq!(
            dev.endpoint_control(0, EndpointOperation::Reset)
                .unwrap_err()
                .status(),
            Some(StatusCode::PipeResetError)
        );
        assert_eq!(
            dev.endpoint_control(0, EndpointOperation::AbortTransfer)
                .unwrap_err()
                .status(),
            Some(StatusCode::PipeAbortError)
        );
        dev.open_pipes().unwrap();
        dev.endpoint_control(1, EndpointOperation::AbortTransfer)
            .unwrap();
        assert_eq!(
            driver.endpoint_ops.borrow().as_slice(),
            &[(1, EndpointOperation::AbortTransfer)]
        );
    }

    #[test]
    fn reset_reaches_driver_and_reports_failure() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        dev.reset().unwrap();
        assert_eq!(driver.resets.get(), 1);
        driver.fail_next("STDevice_Reset", StatusCode::DeviceResetError);
        let err = dev.reset().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::DeviceResetError));
        assert_eq!(err.to_string(), "Device Set Error");
    }

    #[test]
    fn control_request_short_buffer_fails_locally() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let rq = ControlPipeRequest::vendor_device(Direction::In, 0x01, 0, 0, 64);
        let mut buf = [0u8; 16];
        let err = dev.control_pipe_request(&rq, &mut buf).unwrap_err();
        assert_eq!(
            err,
            DeviceError::BufferTooSmall {
                required: 64,
                actual: 16
            }
        );
        assert_eq!(driver.call_count("STDevice_ControlPipeRequest"), 0);
    }

    #[test]
    fn control_request_in_fills_buffer() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.push_control_response(vec![0x00, 0x64, 0x00, 0x00, 0x02, 0x00]);
        let rq = ControlPipeRequest {
            function: UrbFunction::ClassInterface,
            direction: Direction::In,
            request: 0x03,
            value: 0,
            index: 0,
            length: 6,
        };
        let mut buf = [0u8; 8];
        dev.control_pipe_request(&rq, &mut buf).unwrap();
        assert_eq!(&buf[..6], &[0x00, 0x64, 0x00, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn control_request_out_sends_length_bytes() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let rq = ControlPipeRequest::vendor_device(Direction::Out, 0x21, 0x0002, 0, 3);
        let mut buf = [0xAA, 0xBB, 0xCC, 0xDD];
        dev.control_pipe_request(&rq, &mut buf).unwrap();
        let sent = driver.control_requests.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, rq);
        assert_eq!(sent[0].1, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn control_request_driver_failure() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        // No queued response: the mock answers STDEVICE_VENDOR_RQ_PB
        let rq = ControlPipeRequest::vendor_device(Direction::In, 0x01, 0, 0, 4);
        assert_eq!(
            dev.read_control(&rq).unwrap_err().status(),
            Some(StatusCode::VendorRqPb)
        );
    }

    #[test]
    fn read_and_write_control_helpers() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.push_control_response(vec![1, 2, 3, 4]);
        let rq = ControlPipeRequest::vendor_device(Direction::Out, 0x05, 0, 0, 4);
        assert_eq!(dev.read_control(&rq).unwrap(), vec![1, 2, 3, 4]);

        dev.write_control(&rq, &[9, 8]).unwrap();
        let sent = driver.control_requests.borrow();
        assert_eq!(sent[1].0.direction, Direction::Out);
        assert_eq!(sent[1].0.length, 2);
        assert_eq!(sent[1].1, vec![9, 8]);
    }

    #[test]
    fn unknown_driver_code_surfaces_raw_value() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        driver.fail_next_code("STDevice_Reset", STDEVICE_ERROR_OFFSET + 0x17);
        assert_eq!(
            dev.reset().unwrap_err(),
            DeviceError::Unknown(STDEVICE_ERROR_OFFSET + 0x17)
        );
    }

    // ── Config application ──

    #[test]
    fn apply_config_sets_timeout_and_suspend() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        let config = Config {
            default_timeout_ms: 1000,
            allow_suspend: Some(true),
            ..Config::default()
        };
        dev.apply_config(&config).unwrap();
        assert_eq!(driver.timeout_ms.get(), Some(1000));
        assert_eq!(driver.suspend_allowed.get(), Some(true));
    }

    #[test]
    fn apply_default_config_touches_nothing() {
        let driver = MockDriver::new();
        let dev = open(&driver);
        dev.apply_config(&Config::default()).unwrap();
        assert_eq!(driver.timeout_ms.get(), None);
        assert_eq!(driver.suspend_allowed.get(), None);
    }

    #[test]
    fn open_configured_uses_explicit_path() {
        let driver = MockDriver::new();
        let config = Config {
            device_path: MOCK_PATH.into(),
            default_timeout_ms: 500,
            ..Config::default()
        };
        let dev = StDevice::open_configured(&driver, &config).unwrap();
        assert_eq!(dev.path(), MOCK_PATH);
        assert_eq!(driver.timeout_ms.get(), Some(500));
    }

    #[cfg(not(windows))]
    #[test]
    fn open_first_without_discovery_is_not_found() {
        let driver = MockDriver::new();
        let guid = crate::discovery::STM32_DFU_GUID;
        let err = StDevice::open_first(&driver, &guid).unwrap_err();
        assert_eq!(err, DeviceError::NotFound);
    }
}
