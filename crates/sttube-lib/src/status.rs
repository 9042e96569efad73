//! Native status codes returned by every `STDevice_*` entry point.
//!
//! The driver reports success and failure through a closed set of 32-bit codes
//! starting at [`STDEVICE_ERROR_OFFSET`]. The code → message table is fixed.

use std::fmt;

use serde::Serialize;

/// Base value of the status code space (`STDEVICE_NOERROR`).
pub const STDEVICE_ERROR_OFFSET: u32 = 0x1234_0000;

/// Status code reported by the STTube driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum StatusCode {
    NoError = STDEVICE_ERROR_OFFSET,
    Memory = STDEVICE_ERROR_OFFSET + 0x01,
    BadParameter = STDEVICE_ERROR_OFFSET + 0x02,
    NotImplemented = STDEVICE_ERROR_OFFSET + 0x03,
    EnumFinished = STDEVICE_ERROR_OFFSET + 0x04,
    OpenDriverError = STDEVICE_ERROR_OFFSET + 0x05,
    ErrorDescriptorBuilding = STDEVICE_ERROR_OFFSET + 0x06,
    PipeCreationError = STDEVICE_ERROR_OFFSET + 0x07,
    PipeResetError = STDEVICE_ERROR_OFFSET + 0x08,
    PipeAbortError = STDEVICE_ERROR_OFFSET + 0x09,
    StringDescriptorError = STDEVICE_ERROR_OFFSET + 0x0A,
    DriverIsClosed = STDEVICE_ERROR_OFFSET + 0x0B,
    VendorRqPb = STDEVICE_ERROR_OFFSET + 0x0C,
    ErrorWhileReading = STDEVICE_ERROR_OFFSET + 0x0D,
    ErrorBeforeReading = STDEVICE_ERROR_OFFSET + 0x0E,
    ErrorWhileWriting = STDEVICE_ERROR_OFFSET + 0x0F,
    ErrorBeforeWriting = STDEVICE_ERROR_OFFSET + 0x10,
    DeviceResetError = STDEVICE_ERROR_OFFSET + 0x11,
    CantUseUnplugEvent = STDEVICE_ERROR_OFFSET + 0x12,
    IncorrectBufferSize = STDEVICE_ERROR_OFFSET + 0x13,
    DescriptorNotFound = STDEVICE_ERROR_OFFSET + 0x14,
    PipesAreClosed = STDEVICE_ERROR_OFFSET + 0x15,
    PipesAreOpen = STDEVICE_ERROR_OFFSET + 0x16,
}

impl StatusCode {
    /// Every code in the table, in numeric order.
    pub const ALL: [StatusCode; 23] = [
        StatusCode::NoError,
        StatusCode::Memory,
        StatusCode::BadParameter,
        StatusCode::NotImplemented,
        StatusCode::EnumFinished,
        StatusCode::OpenDriverError,
        StatusCode::ErrorDescriptorBuilding,
        StatusCode::PipeCreationError,
        StatusCode::PipeResetError,
        StatusCode::PipeAbortError,
        StatusCode::StringDescriptorError,
        StatusCode::DriverIsClosed,
        StatusCode::VendorRqPb,
        StatusCode::ErrorWhileReading,
        StatusCode::ErrorBeforeReading,
        StatusCode::ErrorWhileWriting,
        StatusCode::ErrorBeforeWriting,
        StatusCode::DeviceResetError,
        StatusCode::CantUseUnplugEvent,
        StatusCode::IncorrectBufferSize,
        StatusCode::DescriptorNotFound,
        StatusCode::PipesAreClosed,
        StatusCode::PipesAreOpen,
    ];

    /// Look up a raw driver code. `None` for codes outside the table.
    pub fn from_code(code: u32) -> Option<Self> {
        let offset = code.checked_sub(STDEVICE_ERROR_OFFSET)?;
        Self::ALL.get(offset as usize).copied()
    }

    /// The raw value the driver uses for this status.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Native constant name, e.g. `STDEVICE_OPENDRIVERERROR`.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::NoError => "STDEVICE_NOERROR",
            StatusCode::Memory => "STDEVICE_MEMORY",
            StatusCode::BadParameter => "STDEVICE_BADPARAMETER",
            StatusCode::NotImplemented => "STDEVICE_NOTIMPLEMENTED",
            StatusCode::EnumFinished => "STDEVICE_ENUMFINISHED",
            StatusCode::OpenDriverError => "STDEVICE_OPENDRIVERERROR",
            StatusCode::ErrorDescriptorBuilding => "STDEVICE_ERRORDESCRIPTORBUILDING",
            StatusCode::PipeCreationError => "STDEVICE_PIPECREATIONERROR",
            StatusCode::PipeResetError => "STDEVICE_PIPERESETERROR",
            StatusCode::PipeAbortError => "STDEVICE_PIPEABORTERROR",
            StatusCode::StringDescriptorError => "STDEVICE_STRINGDESCRIPTORERROR",
            StatusCode::DriverIsClosed => "STDEVICE_DRIVERISCLOSED",
            StatusCode::VendorRqPb => "STDEVICE_VENDOR_RQ_PB",
            StatusCode::ErrorWhileReading => "STDEVICE_ERRORWHILEREADING",
            StatusCode::ErrorBeforeReading => "STDEVICE_ERRORBEFOREREADING",
            StatusCode::ErrorWhileWriting => "STDEVICE_ERRORWHILEWRITING",
            StatusCode::ErrorBeforeWriting => "STDEVICE_ERRORBEFOREWRITING",
            StatusCode::DeviceResetError => "STDEVICE_DEVICERESETERROR",
            StatusCode::CantUseUnplugEvent => "STDEVICE_CANTUSEUNPLUGEVENT",
            StatusCode::IncorrectBufferSize => "STDEVICE_INCORRECTBUFFERSIZE",
            StatusCode::DescriptorNotFound => "STDEVICE_DESCRIPTORNOTFOUND",
            StatusCode::PipesAreClosed => "STDEVICE_PIPESARECLOSED",
            StatusCode::PipesAreOpen => "STDEVICE_PIPESAREOPEN",
        }
    }

    /// Human-readable description.
    ///
    /// `DeviceResetError` reads "Device Set Error"; the text is kept as the
    /// driver's tooling has always reported it.
    pub fn message(self) -> &'static str {
        match self {
            StatusCode::NoError => "No Error",
            StatusCode::Memory => "Memory",
            StatusCode::BadParameter => "Bad Parameter",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::EnumFinished => "Enum Finished",
            StatusCode::OpenDriverError => "Open Driver Error",
            StatusCode::ErrorDescriptorBuilding => "Error Descriptor Building",
            StatusCode::PipeCreationError => "Pipe Creation Error",
            StatusCode::PipeResetError => "Pipe Reset Error",
            StatusCode::PipeAbortError => "Pipe Abort Error",
            StatusCode::StringDescriptorError => "String Descriptor Error",
            StatusCode::DriverIsClosed => "Driver is closed",
            StatusCode::VendorRqPb => "Vendor RQ PB",
            StatusCode::ErrorWhileReading => "Error While Reading",
            StatusCode::ErrorBeforeReading => "Error Before Reading",
            StatusCode::ErrorWhileWriting => "Error While Writing",
            StatusCode::ErrorBeforeWriting => "Error Before Writing",
            StatusCode::DeviceResetError => "Device Set Error",
            StatusCode::CantUseUnplugEvent => "Cant Use Unplug Event",
            StatusCode::IncorrectBufferSize => "Incorrect Buffer Size",
            StatusCode::DescriptorNotFound => "Descriptor Not Found",
            StatusCode::PipesAreClosed => "Pipes are closed",
            StatusCode::PipesAreOpen => "Pipes are open",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_contiguous_from_offset() {
        for (i, status) in StatusCode::ALL.iter().enumerate() {
            assert_eq!(status.code(), STDEVICE_ERROR_OFFSET + i as u32);
        }
    }

    #[test]
    fn from_code_round_trips_every_entry() {
        for status in StatusCode::ALL {
            assert_eq!(StatusCode::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn every_message_is_non_empty() {
        for status in StatusCode::ALL {
            assert!(!status.message().is_empty(), "{status:?}");
            assert!(status.name().starts_with("STDEVICE_"), "{status:?}");
        }
    }

    #[test]
    fn documented_messages() {
        assert_eq!(StatusCode::NoError.message(), "No Error");
        assert_eq!(StatusCode::OpenDriverError.message(), "Open Driver Error");
        assert_eq!(StatusCode::DriverIsClosed.message(), "Driver is closed");
        assert_eq!(StatusCode::VendorRqPb.message(), "Vendor RQ PB");
        assert_eq!(StatusCode::DeviceResetError.message(), "Device Set Error");
        assert_eq!(StatusCode::PipesAreOpen.message(), "Pipes are open");
    }

    #[test]
    fn codes_below_offset_are_unknown() {
        assert_eq!(StatusCode::from_code(0), None);
        assert_eq!(StatusCode::from_code(STDEVICE_ERROR_OFFSET - 1), None);
    }

    #[test]
    fn codes_past_table_are_unknown() {
        // STDEVICE_TIMEOUTWAITINGFORRESET exists in newer headers but not in the table
        assert_eq!(StatusCode::from_code(STDEVICE_ERROR_OFFSET + 0x17), None);
        assert_eq!(StatusCode::from_code(u32::MAX), None);
    }

    #[test]
    fn display_uses_message() {
        assert_eq!(
            StatusCode::DescriptorNotFound.to_string(),
            "Descriptor Not Found"
        );
    }
}
