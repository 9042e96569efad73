//! `endpoint` subcommand — reset or abort an endpoint pipe.

use super::{
    ActionOutput, Config, EndpointOperation, Result, StDevice, Target, TubeDriver, print_json,
    with_device,
};

pub(super) fn cmd_endpoint(
    config: &Config,
    target: &Target,
    index: u32,
    operation: EndpointOperation,
    json: bool,
) -> Result<()> {
    let output = with_device(config, target, |dev| endpoint_control(dev, index, operation))?;
    if json {
        return print_json(&output);
    }
    println!("Endpoint {index}: {operation} done");
    Ok(())
}

/// Open the pipes, apply `operation` to endpoint `index`, close the pipes.
fn endpoint_control<D: TubeDriver>(
    device: &StDevice<'_, D>,
    index: u32,
    operation: EndpointOperation,
) -> Result<ActionOutput> {
    device.open_pipes()?;
    let result = device.endpoint_control(index, operation);
    let closed = device.close_pipes();
    result?;
    closed?;
    Ok(ActionOutput {
        path: device.path().to_string(),
        action: format!("endpoint {index} {operation}"),
        ok: true,
    })
}
