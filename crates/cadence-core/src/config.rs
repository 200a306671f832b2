use anyhow::Result;
use config::Config;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bulk: BulkConfig,
    pub jobs: JobConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    /// Occurrence-count x attendee-count above which a mutation splits into
    /// a synchronous first unit plus an asynchronous remainder.
    pub sync_instance_threshold: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Additional attempts after a failed first attempt.
    pub extra_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Config::builder()
            .set_default("bulk.sync_instance_threshold", 500)?
            .set_default("jobs.extra_attempts", 1)?
            .set_default("logging.level", "debug")?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bulk: BulkConfig {
                sync_instance_threshold: 500,
            },
            jobs: JobConfig { extra_attempts: 1 },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        }
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_documented_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bulk.sync_instance_threshold, 500);
        assert_eq!(settings.jobs.extra_attempts, 1);
    }
}
