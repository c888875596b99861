use anyhow::Result;
use rust_sdr_scanner::config::Config;
use rust_sdr_scanner::radio::FrequencyRange;
use std::fs;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config::default();
    config.device.driver = "rtlsdr".to_string();
    config.device.serial = "00000001".to_string();
    config.device.sample_rate = 1_024_000;
    config
        .scanning
        .scanned_ranges
        .push(FrequencyRange::new(144_000_000, 146_000_000));

    config.save_to_file(&config_path)?;
    let loaded_config = Config::from_file(&config_path)?;

    assert_eq!(loaded_config.device.driver, "rtlsdr");
    assert_eq!(loaded_config.device.serial, "00000001");
    assert_eq!(loaded_config.device.sample_rate, 1_024_000);
    assert_eq!(
        loaded_config.scanning.scanned_ranges,
        vec![FrequencyRange::new(144_000_000, 146_000_000)]
    );

    // a non-existent file is replaced by an editable default
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;
    assert!(non_existent_path.exists());
    assert_eq!(default_config.device.driver, "mock");

    Ok(())
}

#[test]
fn test_yaml_validation() -> Result<()> {
    let temp_dir = tempdir()?;

    // thresholds without hysteresis are rejected at load time
    let config_path = temp_dir.path().join("bad_thresholds.yaml");
    let mut file = fs::File::create(&config_path)?;
    writeln!(
        file,
        "detection:\n  start_threshold: 5.0\n  stop_threshold: 8.0\n"
    )?;
    assert!(Config::from_file(&config_path).is_err());

    // malformed YAML is rejected too
    let config_path = temp_dir.path().join("malformed.yaml");
    let mut file = fs::File::create(&config_path)?;
    writeln!(file, "device: [not, a, mapping")?;
    assert!(Config::from_file(&config_path).is_err());

    Ok(())
}

#[test]
fn test_partial_config_uses_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("partial.yaml");
    let mut file = fs::File::create(&config_path)?;
    writeln!(
        file,
        "device:\n  driver: rtlsdr\n  serial: \"42\"\n  sample_rate: 2048000\n"
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.device.driver, "rtlsdr");
    assert_eq!(config.device.id(), "rtlsdr_42");
    // untouched sections fall back to their defaults
    assert_eq!(config.detection.tuning_step, 2500);
    assert_eq!(config.spectrogram.send_interval_ms, 1000);
    assert!(config.scanning.scanned_ranges.is_empty());

    Ok(())
}
