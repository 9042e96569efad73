//! `devices` subcommand — list device interfaces registered for a GUID.

use super::{Config, DevicesOutput, DiscoveredDevice, Result, discovery, print_json};

pub(super) fn cmd_devices(config: &Config, guid: Option<&str>, json: bool) -> Result<()> {
    let guid = match guid {
        Some(g) => g
            .parse::<discovery::InterfaceGuid>()
            .map_err(sttube_lib::SttubeError::Config)?,
        None => config.guid()?,
    };
    let devices = discovery::enumerate_device_paths(&guid);
    print_devices(&guid.to_string(), devices, json)
}

fn print_devices(guid: &str, devices: Vec<DiscoveredDevice>, json: bool) -> Result<()> {
    if json {
        let output = DevicesOutput {
            guid: guid.to_string(),
            count: devices.len(),
            devices,
        };
        return print_json(&output);
    }

    if devices.is_empty() {
        println!("No devices found for {guid}.");
        return Ok(());
    }

    println!(
        "Found {} device{} for {guid}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, dev.path);
        if let (Some(vid), Some(pid)) = (dev.vendor_id, dev.product_id) {
            println!("      VID:PID: {vid:04X}:{pid:04X}");
        }
        if let Some(ref serial) = dev.serial {
            println!("      Serial:  {serial}");
        }
    }

    Ok(())
}
