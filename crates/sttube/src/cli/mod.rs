//! CLI subcommands — discovery, descriptor inspection, control transfers.

mod config_cmd;
mod control;
mod devices;
mod endpoint;
mod errors;
mod info;
mod reset;
mod string;
mod tree;

use std::path::Path;
use std::str::FromStr;

use clap::{Args, Subcommand};
use serde::Serialize;

pub(super) use sttube_lib::config::Config;
pub(super) use sttube_lib::control::{
    ControlPipeRequest, Direction, EndpointOperation, UrbFunction,
};
pub(super) use sttube_lib::descriptor::DeviceDescriptor;
pub(super) use sttube_lib::device::StDevice;
pub(super) use sttube_lib::discovery::{self, DiscoveredDevice};
pub(super) use sttube_lib::driver::{self, TubeDriver};
pub(super) use sttube_lib::error::Result;
pub(super) use sttube_lib::inventory::DeviceInventory;
pub(super) use sttube_lib::status::StatusCode;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Space-separated uppercase hex, e.g. `01 64 00`.
pub(super) fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print `data` as 16-byte rows prefixed with their offset.
pub(super) fn hex_dump(data: &[u8]) {
    for (i, chunk) in data.chunks(16).enumerate() {
        println!("  {:04X}: {}", i * 16, hex_string(chunk));
    }
}

/// Print a serializable value as pretty JSON.
pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

// ── Argument parsing ──

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub(super) fn parse_int<T: TryFrom<u64>>(s: &str) -> std::result::Result<T, String> {
    let s = s.trim();
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| format!("invalid number '{s}': {e}"))?;
    T::try_from(value).map_err(|_| format!("{value} is out of range"))
}

/// Byte string given as hex, separators (space, `:`, `,`) allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | ':' | ',' | '_'))
            .collect();
        if !digits.is_ascii() {
            return Err(format!("invalid hex data '{s}'"));
        }
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(&digits);
        if digits.len() % 2 != 0 {
            return Err(format!("hex data '{s}' has an odd number of digits"));
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&digits[i..i + 2], 16)
                    .map_err(|_| format!("invalid hex data '{s}'"))
            })
            .collect::<std::result::Result<Vec<u8>, String>>()
            .map(HexBytes)
    }
}

/// Device selection shared by every command that opens a device.
#[derive(Args, Debug, Clone, Default)]
pub struct Target {
    /// Device path (default: `device_path` from config, else first discovered device)
    #[arg(long)]
    pub path: Option<String>,
}

// ── Config / device helpers ──

/// Load the config from `custom_path` or the default location, logging parse warnings.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// `config` with the `--path` override applied.
fn target_config(config: &Config, target: &Target) -> Config {
    let mut effective = config.clone();
    if let Some(path) = &target.path {
        effective.device_path = path.clone();
    }
    effective
}

/// Open the target device on `driver`, run `f`, then close the device.
pub(super) fn with_device_on<D: TubeDriver, T>(
    driver: &D,
    config: &Config,
    target: &Target,
    f: impl FnOnce(&StDevice<'_, D>) -> Result<T>,
) -> Result<T> {
    let mut device = StDevice::open_configured(driver, &target_config(config, target))?;
    let result = f(&device);
    let closed = device.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Load the vendor library named in `config` and run `f` on the target device.
pub(super) fn with_device<T>(
    config: &Config,
    target: &Target,
    f: impl FnOnce(&StDevice<'_, driver::PlatformDriver>) -> Result<T>,
) -> Result<T> {
    let driver = driver::load_driver(&config.library_path)?;
    with_device_on(&driver, config, target, f)
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub guid: String,
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct InfoOutput {
    pub path: String,
    pub usb_version: String,
    pub device_version: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub descriptor: DeviceDescriptor,
}

#[derive(Serialize)]
pub(super) struct StringOutput {
    pub index: u32,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ControlOutput {
    pub request: ControlPipeRequest,
    /// Hex bytes received (IN) or sent (OUT).
    pub data: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub(super) struct ActionOutput {
    pub path: String,
    pub action: String,
    pub ok: bool,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct StatusEntryJson {
    pub code: String,
    pub name: &'static str,
    pub message: &'static str,
}

#[derive(Subcommand)]
pub enum Command {
    /// List device interfaces registered for a GUID
    Devices {
        /// Interface class GUID (default: `device_guid` from config)
        #[arg(long)]
        guid: Option<String>,
    },

    /// Show the device descriptor and its manufacturer, product and serial strings
    Info {
        #[command(flatten)]
        target: Target,
    },

    /// Show the full configuration / interface / alternate setting / endpoint tree
    Tree {
        #[command(flatten)]
        target: Target,
    },

    /// Read one string descriptor
    #[command(name = "string")]
    StringDescriptor {
        /// String descriptor index (e.g. iManufacturer)
        index: u32,
        #[command(flatten)]
        target: Target,
    },

    /// Issue a control pipe request
    Control {
        /// URB function (vendor-device, class-interface, ...)
        #[arg(long, default_value = "vendor-device")]
        function: UrbFunction,
        /// Data stage direction (in or out)
        #[arg(long)]
        direction: Direction,
        /// bRequest
        #[arg(long, value_parser = parse_int::<u8>)]
        request: u8,
        /// wValue
        #[arg(long, default_value = "0", value_parser = parse_int::<u16>)]
        value: u16,
        /// wIndex
        #[arg(long, default_value = "0", value_parser = parse_int::<u16>)]
        index: u16,
        /// Bytes to read (IN, at most 65535); defaults to the size of --data for OUT
        #[arg(long, value_parser = parse_int::<u16>)]
        length: Option<u16>,
        /// Data to send (OUT), as hex
        #[arg(long)]
        data: Option<HexBytes>,
        #[command(flatten)]
        target: Target,
    },

    /// Reset or abort an endpoint pipe
    Endpoint {
        /// Endpoint index within the selected alternate setting
        index: u32,
        /// reset or abort
        operation: EndpointOperation,
        #[command(flatten)]
        target: Target,
    },

    /// Reset the device
    Reset {
        #[command(flatten)]
        target: Target,
    },

    /// Show current configuration and file path
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,

        /// With --init, replace an existing config file
        #[arg(long, requires = "init")]
        force: bool,
    },

    /// List driver status codes and their messages
    Errors,
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    match cmd {
        Command::Devices { guid } => devices::cmd_devices(&config, guid.as_deref(), json),
        Command::Info { target } => info::cmd_info(&config, &target, json),
        Command::Tree { target } => tree::cmd_tree(&config, &target, json),
        Command::StringDescriptor { index, target } => {
            string::cmd_string(&config, &target, index, json)
        }
        Command::Control {
            function,
            direction,
            request,
            value,
            index,
            length,
            data,
            target,
        } => {
            let args = control::ControlArgs {
                function,
                direction,
                request,
                value,
                index,
                length,
                data: data.map(|d| d.0),
            };
            control::cmd_control(&config, &target, &args, json)
        }
        Command::Endpoint {
            index,
            operation,
            target,
        } => endpoint::cmd_endpoint(&config, &target, index, operation, json),
        Command::Reset { target } => reset::cmd_reset(&config, &target, json),
        Command::Config { init, force } => {
            if init {
                config_cmd::init_config(&config, config_path, force)?;
            }
            config_cmd::cmd_config(config, config_path, json)
        }
        Command::Errors => errors::cmd_errors(json),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Short:", "Longer key:"], &[]);
        // "Longer key:" = 11 + PADDING = 13
        assert_eq!(w, 13);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["Very long indent key:"]);
        // "Very long indent key:" = 21 + PADDING + 2 = 25
        assert_eq!(w, 25);
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }

    #[test]
    fn values_align_across_levels() {
        let w = kv_width(&["Top:"], &["Indent:"]);
        let top = format_kv("Top:", "V", w);
        let indent = format!("  {:<width$}{}", "Indent:", "V", width = w - 2);
        assert_eq!(top.find('V'), indent.find('V'));
    }

    #[test]
    fn format_kv_exact_width() {
        // "ExactWidth:" is 11 chars, exceeds width, no padding added
        assert_eq!(format_kv("ExactWidth:", "val", 10), "ExactWidth:val");
    }

    #[test]
    fn hex_string_spacing() {
        assert_eq!(hex_string(&[0x01, 0xAB, 0x00]), "01 AB 00");
        assert_eq!(hex_string(&[]), "");
    }
}
