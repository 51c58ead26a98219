//! Layering tests for config loading. `figment::Jail` isolates the working
//! directory and environment per test.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use figment::Jail;
use pretty_assertions::assert_eq;

use stator_config::{ConfigError, load, load_or_default, save};
use stator_core::{OverflowPolicy, SchedulingMode, StoreConfig};

#[test]
fn missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load(Some(Path::new("absent.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(cfg, StoreConfig::default());
        Ok(())
    });
}

#[test]
fn file_values_are_applied() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "stator.toml",
            r#"
                mode = "deterministic"
                overflow = "buffer-unbounded"
                subscriber-capacity = 4
            "#,
        )?;
        let cfg = load(Some(Path::new("stator.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(cfg.mode, SchedulingMode::Deterministic);
        assert_eq!(cfg.overflow, OverflowPolicy::BufferUnbounded);
        assert_eq!(cfg.subscriber_capacity, 4);
        Ok(())
    });
}

#[test]
fn env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("stator.toml", r#"overflow = "buffer-unbounded""#)?;
        jail.set_env("STATOR_OVERFLOW", "suspend-publisher");
        jail.set_env("STATOR_SUBSCRIBER_CAPACITY", "32");
        let cfg = load(Some(Path::new("stator.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(cfg.overflow, OverflowPolicy::SuspendPublisher);
        assert_eq!(cfg.subscriber_capacity, 32);
        assert_eq!(cfg.mode, SchedulingMode::Concurrent);
        Ok(())
    });
}

#[test]
fn invalid_combination_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "stator.toml",
            r#"
                mode = "deterministic"
                overflow = "suspend-publisher"
            "#,
        )?;
        let err = load(Some(Path::new("stator.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert_eq!(
            load_or_default(Some(Path::new("stator.toml"))),
            StoreConfig::default()
        );
        Ok(())
    });
}

#[test]
fn unknown_policy_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.create_file("stator.toml", r#"overflow = "drop-newest""#)?;
        let err = load(Some(Path::new("stator.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        Ok(())
    });
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let cfg = StoreConfig {
        overflow: OverflowPolicy::BufferUnbounded,
        ..StoreConfig::deterministic()
    };

    save(&cfg, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#"overflow = "buffer-unbounded""#));
    assert_eq!(load(Some(&path)).unwrap(), cfg);
}
