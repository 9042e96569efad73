//! Unified error type for the sttube-lib crate.
//!
//! [`SttubeError`] wraps [`DeviceError`] alongside I/O and configuration
//! failures. `From` impls allow `?` to propagate across module boundaries.

use std::fmt;

use crate::device::DeviceError;

/// Unified error type for sttube-lib operations.
#[derive(Debug)]
pub enum SttubeError {
    /// Driver, handle or descriptor error.
    Device(DeviceError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl fmt::Display for SttubeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SttubeError::Device(e) => write!(f, "{e}"),
            SttubeError::Io(e) => write!(f, "I/O error: {e}"),
            SttubeError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for SttubeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SttubeError::Device(e) => Some(e),
            SttubeError::Io(e) => Some(e),
            SttubeError::Config(_) => None,
        }
    }
}

impl From<DeviceError> for SttubeError {
    fn from(e: DeviceError) -> Self {
        SttubeError::Device(e)
    }
}

impl From<std::io::Error> for SttubeError {
    fn from(e: std::io::Error) -> Self {
        SttubeError::Io(e)
    }
}

/// Crate-level Result alias using [`SttubeError`].
pub type Result<T> = std::result::Result<T, SttubeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    #[test]
    fn from_device_error() {
        let e: SttubeError = DeviceError::NotFound.into();
        assert!(matches!(e, SttubeError::Device(DeviceError::NotFound)));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: SttubeError = io_err.into();
        assert!(matches!(e, SttubeError::Io(_)));
    }

    #[test]
    fn display_device_status_is_table_message() {
        let e = SttubeError::Device(DeviceError::Status(StatusCode::OpenDriverError));
        assert_eq!(e.to_string(), StatusCode::OpenDriverError.message());
    }

    #[test]
    fn display_config_error() {
        let e = SttubeError::Config("invalid guid".into());
        assert_eq!(e.to_string(), "Config error: invalid guid");
    }

    #[test]
    fn source_chains_device_error() {
        let e = SttubeError::Device(DeviceError::Library("missing symbol".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("missing symbol"));
    }

    #[test]
    fn source_none_for_config() {
        let e = SttubeError::Config("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_device_to_sttube() {
        fn inner() -> crate::device::Result<()> {
            Err(DeviceError::Status(StatusCode::DriverIsClosed))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(
            err,
            SttubeError::Device(DeviceError::Status(StatusCode::DriverIsClosed))
        ));
    }

    #[test]
    fn question_mark_propagation_io_to_sttube() {
        fn inner() -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "nope"))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        assert!(matches!(outer().unwrap_err(), SttubeError::Io(_)));
    }
}
