//! Native driver boundary: one method per `STDevice_*` entry point.
//!
//! Implementations return the raw 32-bit status of the call and write results
//! into caller-provided buffers, mirroring the DLL. Translation into
//! [`DeviceError`](crate::device::DeviceError) happens in [`StDevice`](crate::device::StDevice).

use std::ffi::CStr;

use crate::control::{ControlPipeRequest, DescriptorQuery, EndpointOperation};
use crate::descriptor::{
    CONFIGURATION_DESCRIPTOR_LEN, DEVICE_DESCRIPTOR_LEN, ENDPOINT_DESCRIPTOR_LEN,
    INTERFACE_DESCRIPTOR_LEN,
};

#[doc(hidden)]
pub mod mock;
#[cfg(windows)]
mod native;

#[cfg(windows)]
pub use native::NativeDriver;

/// Size of the buffers used for string and class-descriptor retrieval.
pub const STRING_BUFFER_LEN: usize = 512;

/// Default file name of the vendor library.
pub const DEFAULT_LIBRARY: &str = "STTubeDevice30.dll";

/// Opaque native device handle (`HANDLE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(pub usize);

pub trait TubeDriver {
    fn open(&self, path: &CStr, handle: &mut RawHandle) -> u32;
    fn close(&self, handle: RawHandle) -> u32;
    fn open_pipes(&self, handle: RawHandle) -> u32;
    fn close_pipes(&self, handle: RawHandle) -> u32;

    /// Writes an ANSI string, NUL padded, into `buf`.
    fn get_string_descriptor(&self, handle: RawHandle, index: u32, buf: &mut [u8]) -> u32;
    fn get_device_descriptor(
        &self,
        handle: RawHandle,
        desc: &mut [u8; DEVICE_DESCRIPTOR_LEN],
    ) -> u32;

    fn get_nb_of_configurations(&self, handle: RawHandle, count: &mut u32) -> u32;
    fn get_configuration_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        desc: &mut [u8; CONFIGURATION_DESCRIPTOR_LEN],
    ) -> u32;

    fn get_nb_of_interfaces(&self, handle: RawHandle, config: u32, count: &mut u32) -> u32;
    fn get_nb_of_alternates(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        count: &mut u32,
    ) -> u32;
    fn get_interface_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        desc: &mut [u8; INTERFACE_DESCRIPTOR_LEN],
    ) -> u32;

    fn get_nb_of_endpoints(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        count: &mut u32,
    ) -> u32;
    fn get_endpoint_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        endpoint: u32,
        desc: &mut [u8; ENDPOINT_DESCRIPTOR_LEN],
    ) -> u32;

    fn get_nb_of_descriptors(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        count: &mut u32,
    ) -> u32;
    fn get_descriptor(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        index: u32,
        buf: &mut [u8],
    ) -> u32;

    fn select_current_configuration(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
    ) -> u32;
    fn set_default_timeout(&self, handle: RawHandle, timeout_ms: u32) -> u32;
    fn set_suspend_mode_behaviour(&self, handle: RawHandle, allow: bool) -> u32;
    fn endpoint_control(
        &self,
        handle: RawHandle,
        endpoint: u32,
        operation: EndpointOperation,
    ) -> u32;
    fn reset(&self, handle: RawHandle) -> u32;

    /// `data` must hold at least `request.length` bytes.
    fn control_pipe_request(
        &self,
        handle: RawHandle,
        request: &ControlPipeRequest,
        data: &mut [u8],
    ) -> u32;
}

// ── Stub driver for non-Windows hosts ──

/// The vendor library only exists on Windows. Elsewhere loading always fails,
/// so a `StubDriver` value can never exist.
#[cfg(not(windows))]
#[derive(Debug)]
pub enum StubDriver {}

#[cfg(not(windows))]
impl StubDriver {
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::device::Result<Self> {
        Err(crate::device::DeviceError::Library(format!(
            "{}: the STTubeDevice library is only available on Windows",
            path.as_ref().display()
        )))
    }
}

#[cfg(not(windows))]
impl TubeDriver for StubDriver {
    fn open(&self, _path: &CStr, _handle: &mut RawHandle) -> u32 {
        match *self {}
    }
    fn close(&self, _handle: RawHandle) -> u32 {
        match *self {}
    }
    fn open_pipes(&self, _handle: RawHandle) -> u32 {
        match *self {}
    }
    fn close_pipes(&self, _handle: RawHandle) -> u32 {
        match *self {}
    }
    fn get_string_descriptor(&self, _handle: RawHandle, _index: u32, _buf: &mut [u8]) -> u32 {
        match *self {}
    }
    fn get_device_descriptor(
        &self,
        _handle: RawHandle,
        _desc: &mut [u8; DEVICE_DESCRIPTOR_LEN],
    ) -> u32 {
        match *self {}
    }
    fn get_nb_of_configurations(&self, _handle: RawHandle, _count: &mut u32) -> u32 {
        match *self {}
    }
    fn get_configuration_descriptor(
        &self,
        _handle: RawHandle,
        _config: u32,
        _desc: &mut [u8; CONFIGURATION_DESCRIPTOR_LEN],
    ) -> u32 {
        match *self {}
    }
    fn get_nb_of_interfaces(&self, _handle: RawHandle, _config: u32, _count: &mut u32) -> u32 {
        match *self {}
    }
    fn get_nb_of_alternates(
        &self,
        _handle: RawHandle,
        _config: u32,
        _interface: u32,
        _count: &mut u32,
    ) -> u32 {
        match *self {}
    }
    fn get_interface_descriptor(
        &self,
        _handle: RawHandle,
        _config: u32,
        _interface: u32,
        _alt_setting: u32,
        _desc: &mut [u8; INTERFACE_DESCRIPTOR_LEN],
    ) -> u32 {
        match *self {}
    }
    fn get_nb_of_endpoints(
        &self,
        _handle: RawHandle,
        _config: u32,
        _interface: u32,
        _alt_setting: u32,
        _count: &mut u32,
    ) -> u32 {
        match *self {}
    }
    fn get_endpoint_descriptor(
        &self,
        _handle: RawHandle,
        _config: u32,
        _interface: u32,
        _alt_setting: u32,
        _endpoint: u32,
        _desc: &mut [u8; ENDPOINT_DESCRIPTOR_LEN],
    ) -> u32 {
        match *self {}
    }
    fn get_nb_of_descriptors(
        &self,
        _handle: RawHandle,
        _query: &DescriptorQuery,
        _count: &mut u32,
    ) -> u32 {
        match *self {}
    }
    fn get_descriptor(
        &self,
        _handle: RawHandle,
        _query: &DescriptorQuery,
        _index: u32,
        _buf: &mut [u8],
    ) -> u32 {
        match *self {}
    }
    fn select_current_configuration(
        &self,
        _handle: RawHandle,
        _config: u32,
        _interface: u32,
        _alt_setting: u32,
    ) -> u32 {
        match *self {}
    }
    fn set_default_timeout(&self, _handle: RawHandle, _timeout_ms: u32) -> u32 {
        match *self {}
    }
    fn set_suspend_mode_behaviour(&self, _handle: RawHandle, _allow: bool) -> u32 {
        match *self {}
    }
    fn endpoint_control(
        &self,
        _handle: RawHandle,
        _endpoint: u32,
        _operation: EndpointOperation,
    ) -> u32 {
        match *self {}
    }
    fn reset(&self, _handle: RawHandle) -> u32 {
        match *self {}
    }
    fn control_pipe_request(
        &self,
        _handle: RawHandle,
        _request: &ControlPipeRequest,
        _data: &mut [u8],
    ) -> u32 {
        match *self {}
    }
}

/// Concrete driver type for the current platform.
#[cfg(windows)]
pub type PlatformDriver = NativeDriver;
#[cfg(not(windows))]
pub type PlatformDriver = StubDriver;

/// Load the platform driver from `path` (see [`DEFAULT_LIBRARY`]).
pub fn load_driver(path: impl AsRef<std::path::Path>) -> crate::device::Result<PlatformDriver> {
    PlatformDriver::load(path)
}
