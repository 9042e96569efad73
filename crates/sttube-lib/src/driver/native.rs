//! Windows backend: `STTubeDevice30.dll` loaded at runtime.

use std::ffi::{CStr, c_char, c_void};
use std::path::Path;
use std::ptr;

use libloading::{Library, Symbol};
use log::debug;
use windows::core::BOOL;

use super::{RawHandle, TubeDriver};
use crate::control::{ControlPipeRequest, DescriptorQuery, EndpointOperation};
use crate::descriptor::{
    CONFIGURATION_DESCRIPTOR_LEN, DEVICE_DESCRIPTOR_LEN, ENDPOINT_DESCRIPTOR_LEN,
    INTERFACE_DESCRIPTOR_LEN,
};
use crate::device::{DeviceError, Result};

type Handle = *mut c_void;

// Entry point signatures from STTubeDeviceFun30.h. Descriptor pointers refer to
// the packed USB_*_DESCRIPTOR records, which are written as plain bytes.
type Open = unsafe extern "system" fn(*mut c_char, *mut Handle, *mut Handle) -> u32;
type HandleOnly = unsafe extern "system" fn(Handle) -> u32;
type GetStringDescriptor = unsafe extern "system" fn(Handle, u32, *mut c_char, u32) -> u32;
type GetDeviceDescriptor = unsafe extern "system" fn(Handle, *mut u8) -> u32;
type GetCount0 = unsafe extern "system" fn(Handle, *mut u32) -> u32;
type GetCount1 = unsafe extern "system" fn(Handle, u32, *mut u32) -> u32;
type GetCount2 = unsafe extern "system" fn(Handle, u32, u32, *mut u32) -> u32;
type GetCount3 = unsafe extern "system" fn(Handle, u32, u32, u32, *mut u32) -> u32;
type GetConfigurationDescriptor = unsafe extern "system" fn(Handle, u32, *mut u8) -> u32;
type GetInterfaceDescriptor = unsafe extern "system" fn(Handle, u32, u32, u32, *mut u8) -> u32;
type GetEndPointDescriptor = unsafe extern "system" fn(Handle, u32, u32, u32, u32, *mut u8) -> u32;
type GetNbOfDescriptors =
    unsafe extern "system" fn(Handle, u8, u8, u32, u32, u32, u32, *mut u32) -> u32;
type GetDescriptor =
    unsafe extern "system" fn(Handle, u8, u8, u32, u32, u32, u32, u32, *mut u8, u32) -> u32;
type SelectCurrentConfiguration = unsafe extern "system" fn(Handle, u32, u32, u32) -> u32;
type SetDefaultTimeOut = unsafe extern "system" fn(Handle, u32) -> u32;
type SetSuspendModeBehaviour = unsafe extern "system" fn(Handle, BOOL) -> u32;
type EndPointControl = unsafe extern "system" fn(Handle, u32, u32) -> u32;
type ControlPipeRequestFn = unsafe extern "system" fn(Handle, *mut CntrPipeRq, *mut u8) -> u32;

/// `CNTRPIPE_RQ` from STTubeDeviceTyp30.h.
#[repr(C)]
struct CntrPipeRq {
    function: u16,
    direction: u32,
    request: u8,
    value: u16,
    index: u16,
    length: u32,
}

impl From<&ControlPipeRequest> for CntrPipeRq {
    fn from(rq: &ControlPipeRequest) -> Self {
        CntrPipeRq {
            function: rq.function.code(),
            direction: rq.direction.code(),
            request: rq.request,
            value: rq.value,
            index: rq.index,
            length: rq.length,
        }
    }
}

fn to_native(handle: RawHandle) -> Handle {
    handle.0 as Handle
}

/// Resolve `name` and copy the function pointer out of the symbol.
///
/// # Safety
/// `T` must match the exported function's signature.
unsafe fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol: Symbol<T> = unsafe { library.get(name.as_bytes()) }
        .map_err(|e| DeviceError::Library(format!("{name}: {e}")))?;
    Ok(*symbol)
}

/// The loaded vendor library with every entry point resolved.
pub struct NativeDriver {
    open: Open,
    close: HandleOnly,
    open_pipes: HandleOnly,
    close_pipes: HandleOnly,
    get_string_descriptor: GetStringDescriptor,
    get_device_descriptor: GetDeviceDescriptor,
    get_nb_of_configurations: GetCount0,
    get_configuration_descriptor: GetConfigurationDescriptor,
    get_nb_of_interfaces: GetCount1,
    get_nb_of_alternates: GetCount2,
    get_interface_descriptor: GetInterfaceDescriptor,
    get_nb_of_endpoints: GetCount3,
    get_endpoint_descriptor: GetEndPointDescriptor,
    get_nb_of_descriptors: GetNbOfDescriptors,
    get_descriptor: GetDescriptor,
    select_current_configuration: SelectCurrentConfiguration,
    set_default_timeout: SetDefaultTimeOut,
    set_suspend_mode_behaviour: SetSuspendModeBehaviour,
    endpoint_control: EndPointControl,
    reset: HandleOnly,
    control_pipe_request: ControlPipeRequestFn,
    // Dropped last: the function pointers above point into it.
    _library: Library,
}

impl NativeDriver {
    /// Load the library at `path` and resolve every `STDevice_*` export.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }
            .map_err(|e| DeviceError::Library(format!("{}: {e}", path.display())))?;

        // SAFETY: every type alias above mirrors the declaration in STTubeDeviceFun30.h.
        let driver = unsafe {
            NativeDriver {
                open: resolve(&library, "STDevice_Open")?,
                close: resolve(&library, "STDevice_Close")?,
                open_pipes: resolve(&library, "STDevice_OpenPipes")?,
                close_pipes: resolve(&library, "STDevice_ClosePipes")?,
                get_string_descriptor: resolve(&library, "STDevice_GetStringDescriptor")?,
                get_device_descriptor: resolve(&library, "STDevice_GetDeviceDescriptor")?,
                get_nb_of_configurations: resolve(&library, "STDevice_GetNbOfConfigurations")?,
                get_configuration_descriptor: resolve(
                    &library,
                    "STDevice_GetConfigurationDescriptor",
                )?,
                get_nb_of_interfaces: resolve(&library, "STDevice_GetNbOfInterfaces")?,
                get_nb_of_alternates: resolve(&library, "STDevice_GetNbOfAlternates")?,
                get_interface_descriptor: resolve(&library, "STDevice_GetInterfaceDescriptor")?,
                get_nb_of_endpoints: resolve(&library, "STDevice_GetNbOfEndPoints")?,
                get_endpoint_descriptor: resolve(&library, "STDevice_GetEndPointDescriptor")?,
                get_nb_of_descriptors: resolve(&library, "STDevice_GetNbOfDescriptors")?,
                get_descriptor: resolve(&library, "STDevice_GetDescriptor")?,
                select_current_configuration: resolve(
                    &library,
                    "STDevice_SelectCurrentConfiguration",
                )?,
                set_default_timeout: resolve(&library, "STDevice_SetDefaultTimeOut")?,
                set_suspend_mode_behaviour: resolve(&library, "STDevice_SetSuspendModeBehaviour")?,
                endpoint_control: resolve(&library, "STDevice_EndPointControl")?,
                reset: resolve(&library, "STDevice_Reset")?,
                control_pipe_request: resolve(&library, "STDevice_ControlPipeRequest")?,
                _library: library,
            }
        };

        debug!("Loaded STTube driver from {}", path.display());
        Ok(driver)
    }
}

// Every call below hands the DLL a handle obtained from STDevice_Open and
// buffers whose sizes match what the entry point writes.
impl TubeDriver for NativeDriver {
    fn open(&self, path: &CStr, handle: &mut RawHandle) -> u32 {
        let mut native: Handle = ptr::null_mut();
        let status =
            unsafe { (self.open)(path.as_ptr().cast_mut(), &mut native, ptr::null_mut()) };
        *handle = RawHandle(native as usize);
        status
    }

    fn close(&self, handle: RawHandle) -> u32 {
        unsafe { (self.close)(to_native(handle)) }
    }

    fn open_pipes(&self, handle: RawHandle) -> u32 {
        unsafe { (self.open_pipes)(to_native(handle)) }
    }

    fn close_pipes(&self, handle: RawHandle) -> u32 {
        unsafe { (self.close_pipes)(to_native(handle)) }
    }

    fn get_string_descriptor(&self, handle: RawHandle, index: u32, buf: &mut [u8]) -> u32 {
        unsafe {
            (self.get_string_descriptor)(
                to_native(handle),
                index,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
            )
        }
    }

    fn get_device_descriptor(
        &self,
        handle: RawHandle,
        desc: &mut [u8; DEVICE_DESCRIPTOR_LEN],
    ) -> u32 {
        unsafe { (self.get_device_descriptor)(to_native(handle), desc.as_mut_ptr()) }
    }

    fn get_nb_of_configurations(&self, handle: RawHandle, count: &mut u32) -> u32 {
        unsafe { (self.get_nb_of_configurations)(to_native(handle), count) }
    }

    fn get_configuration_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        desc: &mut [u8; CONFIGURATION_DESCRIPTOR_LEN],
    ) -> u32 {
        unsafe { (self.get_configuration_descriptor)(to_native(handle), config, desc.as_mut_ptr()) }
    }

    fn get_nb_of_interfaces(&self, handle: RawHandle, config: u32, count: &mut u32) -> u32 {
        unsafe { (self.get_nb_of_interfaces)(to_native(handle), config, count) }
    }

    fn get_nb_of_alternates(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        count: &mut u32,
    ) -> u32 {
        unsafe { (self.get_nb_of_alternates)(to_native(handle), config, interface, count) }
    }

    fn get_interface_descriptor(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        desc: &mut [u8; INTERFACE_DESCRIPTOR_LEN],
    ) -> u32 {
        unsafe {
            (self.get_interface_descriptor)(
                to_native(handle),
                config,
                interface,
                alt_setting,
                desc.as_mut_ptr(),
            )
        }
    }

    fn get_nb_of_endpoints(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
        count: &mut u32,
    ) -> u32 {
        unsafe {
            (self.get_nb_of_endpoints)(to_native(handle), config, interface, alt_setting, count)
        }
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
        unsafe {
            (self.get_endpoint_descriptor)(
                to_native(handle),
                config,
                interface,
                alt_setting,
                endpoint,
                desc.as_mut_ptr(),
            )
        }
    }

    fn get_nb_of_descriptors(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        count: &mut u32,
    ) -> u32 {
        unsafe {
            (self.get_nb_of_descriptors)(
                to_native(handle),
                query.level.code(),
                query.descriptor_type,
                query.config,
                query.interface,
                query.alt_setting,
                query.endpoint,
                count,
            )
        }
    }

    fn get_descriptor(
        &self,
        handle: RawHandle,
        query: &DescriptorQuery,
        index: u32,
        buf: &mut [u8],
    ) -> u32 {
        unsafe {
            (self.get_descriptor)(
                to_native(handle),
                query.level.code(),
                query.descriptor_type,
                query.config,
                query.interface,
                query.alt_setting,
                query.endpoint,
                index,
                buf.as_mut_ptr(),
                buf.len() as u32,
            )
        }
    }

    fn select_current_configuration(
        &self,
        handle: RawHandle,
        config: u32,
        interface: u32,
        alt_setting: u32,
    ) -> u32 {
        unsafe {
            (self.select_current_configuration)(to_native(handle), config, interface, alt_setting)
        }
    }

    fn set_default_timeout(&self, handle: RawHandle, timeout_ms: u32) -> u32 {
        unsafe { (self.set_default_timeout)(to_native(handle), timeout_ms) }
    }

    fn set_suspend_mode_behaviour(&self, handle: RawHandle, allow: bool) -> u32 {
        unsafe { (self.set_suspend_mode_behaviour)(to_native(handle), BOOL::from(allow)) }
    }

    fn endpoint_control(
        &self,
        handle: RawHandle,
        endpoint: u32,
        operation: EndpointOperation,
    ) -> u32 {
        unsafe { (self.endpoint_control)(to_native(handle), endpoint, operation.code()) }
    }

    fn reset(&self, handle: RawHandle) -> u32 {
        unsafe { (self.reset)(to_native(handle)) }
    }

    fn control_pipe_request(
        &self,
        handle: RawHandle,
        request: &ControlPipeRequest,
        data: &mut [u8],
    ) -> u32 {
        let mut native = CntrPipeRq::from(request);
        unsafe { (self.control_pipe_request)(to_native(handle), &mut native, data.as_mut_ptr()) }
    }
}
