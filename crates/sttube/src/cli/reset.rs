//! `reset` subcommand — reset the device.

use super::{ActionOutput, Config, Result, StDevice, Target, TubeDriver, print_json, with_device};

pub(super) fn cmd_reset(config: &Config, target: &Target, json: bool) -> Result<()> {
    let output = with_device(config, target, reset_device)?;
    if json {
        return print_json(&output);
    }
    println!("Device reset: {}", output.path);
    Ok(())
}

fn reset_device<D: TubeDriver>(device: &StDevice<'_, D>) -> Result<ActionOutput> {
    device.reset()?;
    Ok(ActionOutput {
        path: device.path().to_string(),
        action: "reset".into(),
        ok: true,
    })
}
