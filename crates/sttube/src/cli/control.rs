//! `control` subcommand — issue a control pipe request.

use super::{
    Config, ControlOutput, ControlPipeRequest, Direction, Result, StDevice, Target, TubeDriver,
    UrbFunction, hex_dump, hex_string, print_json, with_device,
};
use sttube_lib::SttubeError;

/// Parsed `control` arguments.
#[derive(Debug, Clone)]
pub(super) struct ControlArgs {
    pub function: UrbFunction,
    pub direction: Direction,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: Option<u16>,
    pub data: Option<Vec<u8>>,
}

impl ControlArgs {
    /// The request and its data buffer. IN requests need `--length`; OUT
    /// requests default their length to the size of `--data`. `wLength` is
    /// 16-bit, so neither may exceed 65535 bytes.
    fn build(&self) -> Result<(ControlPipeRequest, Vec<u8>)> {
        let (length, buffer) = match self.direction {
            Direction::In => {
                let Some(length) = self.length else {
                    return Err(SttubeError::Config(
                        "--length is required for IN requests".into(),
                    ));
                };
                if self.data.is_some() {
                    log::warn!("--data is ignored for IN requests");
                }
                (length, vec![0u8; usize::from(length)])
            }
            Direction::Out => {
                let data = self.data.clone().unwrap_or_default();
                let length = match self.length {
                    Some(length) => length,
                    None => u16::try_from(data.len()).map_err(|_| {
                        SttubeError::Config(format!(
                            "--data is {} bytes, a control transfer carries at most {}",
                            data.len(),
                            u16::MAX
                        ))
                    })?,
                };
                (length, data)
            }
        };
        let request = ControlPipeRequest {
            function: self.function,
            direction: self.direction,
            request: self.request,
            value: self.value,
            index: self.index,
            length: u32::from(length),
        };
        Ok((request, buffer))
    }
}

pub(super) fn cmd_control(
    config: &Config,
    target: &Target,
    args: &ControlArgs,
    json: bool,
) -> Result<()> {
    let (request, buffer) = args.build()?;
    let output = with_device(config, target, |dev| transfer(dev, &request, buffer))?;
    print_control(&output, json)
}

fn transfer<D: TubeDriver>(
    device: &StDevice<'_, D>,
    request: &ControlPipeRequest,
    mut buffer: Vec<u8>,
) -> Result<ControlOutput> {
    device.control_pipe_request(request, &mut buffer)?;
    buffer.truncate(request.length as usize);
    Ok(ControlOutput {
        request: *request,
        data: hex_string(&buffer),
        raw: buffer,
    })
}

fn print_control(output: &ControlOutput, json: bool) -> Result<()> {
    if json {
        return print_json(output);
    }
    let rq = &output.request;
    println!(
        "{} {} bRequest=0x{:02X} wValue=0x{:04X} wIndex=0x{:04X} wLength={}",
        rq.function, rq.direction, rq.request, rq.value, rq.index, rq.length
    );
    hex_dump(&output.raw);
    Ok(())
}
