//! `tree` subcommand — configuration / interface / alternate setting / endpoint tree.

use super::{Config, DeviceInventory, Result, Target, print_json, with_device};

pub(super) fn cmd_tree(config: &Config, target: &Target, json: bool) -> Result<()> {
    let inventory = with_device(config, target, |dev| Ok(DeviceInventory::collect(dev)?))?;
    print_tree(&inventory, json)
}

fn print_tree(inv: &DeviceInventory, json: bool) -> Result<()> {
    if json {
        return print_json(inv);
    }

    let d = &inv.device;
    println!(
        "{:04X}:{:04X}  {} {}",
        d.vendor_id,
        d.product_id,
        inv.manufacturer.as_deref().unwrap_or("?"),
        inv.product.as_deref().unwrap_or("?")
    );
    println!("  {}", inv.path);

    for config in &inv.configurations {
        let c = &config.descriptor;
        println!(
            "  Configuration {} (value {}, {} mA{}{})",
            config.index,
            c.configuration_value,
            c.max_power_ma(),
            if c.self_powered() { ", self-powered" } else { "" },
            if c.remote_wakeup() { ", remote wakeup" } else { "" }
        );
        for iface in &config.interfaces {
            println!("    Interface {}", iface.index);
            for alt in &iface.alternates {
                let a = &alt.descriptor;
                print!(
                    "      Alt {}  class {:02X}/{:02X}/{:02X}",
                    alt.index, a.interface_class, a.interface_subclass, a.interface_protocol
                );
                match &alt.name {
                    Some(name) => println!("  \"{name}\""),
                    None => println!(),
                }
                for ep in &alt.endpoints {
                    let e = &ep.descriptor;
                    println!(
                        "        Endpoint {}  0x{:02X} {} {}, {} bytes",
                        ep.index,
                        e.endpoint_address,
                        if e.is_in() { "IN" } else { "OUT" },
                        e.transfer_type(),
                        e.max_packet_size
                    );
                }
            }
        }
    }
    Ok(())
}
