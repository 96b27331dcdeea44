use anyhow::Context;
use config::{Config, Environment, File};
use std::path::Path;
use uploader_core::settings::UploaderSettings;

/// Environment variables such as `UPLOADER__UPLOADER__DRY_RUN=true` override the file.
const ENV_PREFIX: &str = "UPLOADER";

/// Loads and validates the service settings.
pub fn load_settings(path: &Path) -> anyhow::Result<UploaderSettings> {
    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let settings: UploaderSettings = settings
        .try_deserialize()
        .context("Invalid uploader configuration")?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing::Environment as PricingEnvironment;
    use std::io::Write;
    use uploader_core::settings::SourceKind;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            r#"
polling_interval_secs = 30

[uploader]
dry_run = true

[[sources]]
kind = "IceDatFile"
input_directory = "/data/ice"

[[destinations]]
environment = "Production"
is_primary = true
chunk_size = 50

[[destinations]]
environment = "Test"
is_primary = false
max_log_level = "warn"

[destinations.endpoint]
holidays = ["2018-12-25"]
"#,
        );

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.polling_interval_secs, 30);
        assert!(settings.uploader.dry_run);
        assert_eq!(settings.sources[0].kind, SourceKind::IceDatFile);
        assert_eq!(settings.destinations.len(), 2);
        assert_eq!(settings.destinations[0].environment, PricingEnvironment::Production);
        assert_eq!(settings.destinations[0].chunk_size, 50);
        assert_eq!(settings.destinations[1].max_log_level, log::Level::Warn);
        assert_eq!(settings.destinations[1].endpoint.holidays.len(), 1);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let file = write_config(
            r#"
[[sources]]
kind = "NymexOptionFile"
input_directory = "/data/nymex"

[[destinations]]
environment = "Production"
is_primary = false
"#,
        );

        let err = load_settings(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_settings(Path::new("/nonexistent/uploader.toml")).is_err());
    }
}
