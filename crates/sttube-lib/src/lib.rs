//! STTube — bindings for the STMicroelectronics STTubeDevice30 USB driver library.

pub mod config;
pub mod control;
pub mod descriptor;
pub mod device;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod status;

pub use error::SttubeError;
