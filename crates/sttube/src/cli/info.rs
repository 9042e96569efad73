//! `info` subcommand — device descriptor and identification strings.

use super::{
    Config, InfoOutput, Result, StDevice, Target, TubeDriver, kv, kv_indent, kv_width, print_json,
    with_device,
};

pub(super) fn cmd_info(config: &Config, target: &Target, json: bool) -> Result<()> {
    let info = with_device(config, target, collect_info)?;
    print_info(&info, json)
}

fn collect_info<D: TubeDriver>(device: &StDevice<'_, D>) -> Result<InfoOutput> {
    let desc = device.device_descriptor()?;
    Ok(InfoOutput {
        path: device.path().to_string(),
        usb_version: desc.usb_version(),
        device_version: desc.device_version(),
        manufacturer: device.optional_string(desc.manufacturer_index),
        product: device.optional_string(desc.product_index),
        serial_number: device.optional_string(desc.serial_number_index),
        descriptor: desc,
    })
}

fn print_info(info: &InfoOutput, json: bool) -> Result<()> {
    if json {
        return print_json(info);
    }

    let d = &info.descriptor;
    let w = kv_width(
        &["Path:", "Manufacturer:", "Product:", "Serial:"],
        &["VID:PID:", "USB:", "Release:", "Class:", "EP0 size:", "Configurations:"],
    );
    let or_none = |s: &Option<String>| s.clone().unwrap_or_else(|| "(none)".into());

    kv("Path:", &info.path, w);
    kv("Manufacturer:", or_none(&info.manufacturer), w);
    kv("Product:", or_none(&info.product), w);
    kv("Serial:", or_none(&info.serial_number), w);
    println!();
    println!("Device descriptor:");
    kv_indent(
        "VID:PID:",
        format_args!("{:04X}:{:04X}", d.vendor_id, d.product_id),
        w,
    );
    kv_indent("USB:", &info.usb_version, w);
    kv_indent("Release:", &info.device_version, w);
    kv_indent(
        "Class:",
        format_args!(
            "{:02X}/{:02X}/{:02X}",
            d.device_class, d.device_subclass, d.device_protocol
        ),
        w,
    );
    kv_indent("EP0 size:", d.max_packet_size0, w);
    kv_indent("Configurations:", d.num_configurations, w);
    Ok(())
}
