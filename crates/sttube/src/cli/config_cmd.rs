//! `config` subcommand — show current configuration and file path, or write it out.

use std::path::Path;

use sttube_lib::SttubeError;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

/// Write `config` to `custom_path`, or to the default location when none is given.
///
/// An existing file is only replaced when `force` is set.
pub(super) fn init_config(
    config: &Config,
    custom_path: Option<&Path>,
    force: bool,
) -> Result<()> {
    let target = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    if !force && let Some(path) = target.as_ref().filter(|p| p.exists()) {
        return Err(SttubeError::Config(format!(
            "{} already exists (use --force to replace it)",
            path.display()
        )));
    }
    match custom_path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    if let Some(path) = &target {
        log::debug!("Wrote {}", path.display());
    }
    Ok(())
}

pub(super) fn cmd_config(config: Config, custom_path: Option<&Path>, json: bool) -> Result<()> {
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().map(|p| p.exists()).unwrap_or(false);
    let problems: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        };
        return print_json(&output);
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "library_path:",
            "device_guid:",
            "device_path:",
            "default_timeout_ms:",
            "allow_suspend:",
        ],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("library_path:", &config.library_path, w);
    kv_indent("device_guid:", &config.device_guid, w);
    let path_label = if config.device_path.is_empty() {
        "(first discovered)"
    } else {
        config.device_path.as_str()
    };
    kv_indent("device_path:", path_label, w);
    let timeout_label = if config.default_timeout_ms == 0 {
        "(driver default)".to_string()
    } else {
        format!("{} ms", config.default_timeout_ms)
    };
    kv_indent("default_timeout_ms:", timeout_label, w);
    let suspend_label = match config.allow_suspend {
        Some(true) => "allowed",
        Some(false) => "disallowed",
        None => "(driver default)",
    };
    kv_indent("allow_suspend:", suspend_label, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_both_formats_succeed() {
        assert!(cmd_config(Config::default(), None, false).is_ok());
        assert!(cmd_config(Config::default(), None, true).is_ok());
    }

    #[test]
    fn invalid_config_still_prints() {
        let config = Config {
            device_guid: "bogus".into(),
            allow_suspend: Some(false),
            ..Config::default()
        };
        assert!(cmd_config(config, None, false).is_ok());
    }

    #[test]
    fn init_writes_current_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = Config {
            default_timeout_ms: 750,
            ..Config::default()
        };
        init_config(&config, Some(&path), false).unwrap();

        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded, config);
    }

    #[test]
    fn init_refuses_existing_file_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_timeout_ms = 5\n").unwrap();

        let err = init_config(&Config::default(), Some(&path), false).unwrap_err();
        assert!(matches!(err, SttubeError::Config(_)));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "default_timeout_ms = 5\n"
        );

        init_config(&Config::default(), Some(&path), true).unwrap();
        assert_eq!(Config::load_from(&path).0, Config::default());
    }

    #[test]
    fn custom_path_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        Config::default().save_to(&path).unwrap();
        assert!(cmd_config(Config::default(), Some(&path), true).is_ok());
    }
}
