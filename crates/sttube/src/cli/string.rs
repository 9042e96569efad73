//! `string` subcommand — read one string descriptor.

use super::{Config, Result, StringOutput, Target, print_json, with_device};

pub(super) fn cmd_string(config: &Config, target: &Target, index: u32, json: bool) -> Result<()> {
    let value = with_device(config, target, |dev| Ok(dev.string_descriptor(index)?))?;
    print_string(&StringOutput { index, value }, json)
}

fn print_string(output: &StringOutput, json: bool) -> Result<()> {
    if json {
        return print_json(output);
    }
    println!("{}", output.value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_string_both_formats() {
        let output = StringOutput {
            index: 1,
            value: "STMicroelectronics".into(),
        };
        assert!(print_string(&output, false).is_ok());
        assert!(print_string(&output, true).is_ok());
    }

    #[test]
    fn string_json_shape() {
        let output = StringOutput {
            index: 2,
            value: "STM32  BOOTLOADER".into(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["value"], "STM32  BOOTLOADER");
    }
}
