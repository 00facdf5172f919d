#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Serializes tests that read or write POCKET_* variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config_valid() {
        let config = PocketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.initial_bpm, 60);
        assert_eq!(config.monitor.tick_interval_us(), 500_000);
        assert_eq!(config.monitor.refresh_window_us(), 60_000_000);
        assert_eq!(config.breathing.initial_steps, 5);
        assert_eq!(config.breathing.step_interval_us(), 3_000_000);
        assert_eq!(config.bands.normal_below, 100);
        assert_eq!(config.bands.high_below, 200);
    }

    #[test]
    fn test_config_validation_monitor() {
        let mut config = PocketConfig::default();
        config.monitor.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PocketConfig::default();
        config.monitor.fallback_min_bpm = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_breathing() {
        let mut config = PocketConfig::default();
        config.breathing.initial_steps = 0;
        assert!(config.validate().is_err());

        let mut config = PocketConfig::default();
        config.breathing.step_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bands() {
        let mut config = PocketConfig::default();
        config.bands.normal_below = 200;
        config.bands.high_below = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_to_toml_string() {
        let config = PocketConfig::default();
        let toml_str = config.to_toml_string().unwrap();

        assert!(toml_str.contains("[monitor]"));
        assert!(toml_str.contains("[breathing]"));
        assert!(toml_str.contains("[bands]"));
        assert!(toml_str.contains("step_interval_ms"));
    }

    #[test]
    fn test_config_from_partial_toml() {
        let toml_str = r#"
            [breathing]
            initial_steps = 7

            [bands]
            normal_below = 90
        "#;
        let config: PocketConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.breathing.initial_steps, 7);
        assert_eq!(config.breathing.step_interval_ms, 3_000);
        assert_eq!(config.bands.normal_below, 90);
        assert_eq!(config.bands.high_below, 200);
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let mut config = PocketConfig::default();
        config.monitor.fallback_seed = Some(42);
        config.breathing.step_interval_ms = 4_000;

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = PocketConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[breathing]\ninitial_steps = 0\n").unwrap();
        assert!(matches!(
            PocketConfig::from_file(file.path()),
            Err(ConfigError::Validation(_))
        ));

        fs::write(file.path(), "[breathing\n").unwrap();
        assert!(matches!(
            PocketConfig::from_file(file.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    /// Clears the named variables on drop so a failed assertion cannot leak
    /// them into later tests.
    struct EnvVarsGuard(&'static [&'static str]);

    impl Drop for EnvVarsGuard {
        fn drop(&mut self) {
            for name in self.0 {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _vars = EnvVarsGuard(&[
            "POCKET_BREATHING_INITIAL_STEPS",
            "POCKET_MONITOR_FALLBACK_SEED",
            "POCKET_MONITOR_FALLBACK_MIN_BPM",
            "POCKET_MONITOR_FALLBACK_MAX_BPM",
            "POCKET_BANDS_HIGH_BELOW",
        ]);
        let file = NamedTempFile::new().unwrap();
        PocketConfig::default().save_to_file(file.path()).unwrap();

        env::set_var("POCKET_BREATHING_INITIAL_STEPS", "9");
        env::set_var("POCKET_MONITOR_FALLBACK_SEED", "123");
        env::set_var("POCKET_MONITOR_FALLBACK_MIN_BPM", "40");
        env::set_var("POCKET_MONITOR_FALLBACK_MAX_BPM", "180");
        let config = PocketConfig::from_file_with_env(file.path()).unwrap();
        assert_eq!(config.breathing.initial_steps, 9);
        assert_eq!(config.monitor.fallback_seed, Some(123));
        assert_eq!(config.monitor.fallback_min_bpm, 40);
        assert_eq!(config.monitor.fallback_max_bpm, 180);

        env::set_var("POCKET_MONITOR_FALLBACK_MAX_BPM", "30");
        assert!(matches!(
            PocketConfig::from_file_with_env(file.path()),
            Err(ConfigError::Validation(_))
        ));
        env::remove_var("POCKET_MONITOR_FALLBACK_MAX_BPM");

        env::set_var("POCKET_BANDS_HIGH_BELOW", "not-a-number");
        let err = PocketConfig::from_file_with_env(file.path()).unwrap_err();
        assert!(err.to_string().contains("POCKET_BANDS_HIGH_BELOW"));
    }

    #[test]
    fn test_load_layered_missing_files_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let missing = std::path::Path::new("/nonexistent/pocket.toml");
        let config = PocketConfig::load_layered(Some(missing), Some(missing)).unwrap();
        assert_eq!(config.breathing, BreathingConfig::default());
    }

    #[test]
    fn test_load_layered_user_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let default_file = NamedTempFile::new().unwrap();
        fs::write(default_file.path(), "[breathing]\ninitial_steps = 3\n").unwrap();
        let user_file = NamedTempFile::new().unwrap();
        fs::write(user_file.path(), "[breathing]\ninitial_steps = 8\n").unwrap();

        let config =
            PocketConfig::load_layered(Some(default_file.path()), Some(user_file.path())).unwrap();
        assert_eq!(config.breathing.initial_steps, 8);
    }

    #[test]
    fn test_load_layered_merges_sections() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let default_file = NamedTempFile::new().unwrap();
        fs::write(
            default_file.path(),
            "[bands]\nnormal_below = 90\n\n[breathing]\nstep_interval_ms = 4000\n",
        )
        .unwrap();
        let user_file = NamedTempFile::new().unwrap();
        fs::write(user_file.path(), "[breathing]\ninitial_steps = 8\n").unwrap();

        let config =
            PocketConfig::load_layered(Some(default_file.path()), Some(user_file.path())).unwrap();
        assert_eq!(config.bands.normal_below, 90);
        assert_eq!(config.breathing.initial_steps, 8);
        assert_eq!(config.breathing.step_interval_ms, 4000);
        assert_eq!(config.monitor, MonitorConfig::default());
    }
}
