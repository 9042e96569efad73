//! `errors` subcommand — the driver status code table.

use super::{Result, StatusCode, StatusEntryJson, print_json};

fn status_entries() -> Vec<StatusEntryJson> {
    StatusCode::ALL
        .iter()
        .map(|s| StatusEntryJson {
            code: format!("0x{:08X}", s.code()),
            name: s.name(),
            message: s.message(),
        })
        .collect()
}

pub(super) fn cmd_errors(json: bool) -> Result<()> {
    let entries = status_entries();
    if json {
        return print_json(&entries);
    }
    let name_width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0) + 2;
    for e in &entries {
        println!("{}  {:<name_width$}{}", e.code, e.name, e.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_every_code() {
        let entries = status_entries();
        assert_eq!(entries.len(), 23);
        assert_eq!(entries[0].code, "0x12340000");
        assert_eq!(entries[0].name, "STDEVICE_NOERROR");
        assert_eq!(entries[22].code, "0x12340016");
        assert!(entries.iter().all(|e| !e.message.is_empty()));
    }

    #[test]
    fn cmd_errors_both_formats() {
        assert!(cmd_errors(false).is_ok());
        assert!(cmd_errors(true).is_ok());
    }
}
