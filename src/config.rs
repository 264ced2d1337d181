use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MoodlensConfig {
    pub gate: GateConfig,
    pub pipeline: PipelineConfig,
    pub journal: JournalConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GateConfig {
    /// Minimum spacing between face presence checks, in milliseconds
    #[serde(default = "default_analysis_interval_ms")]
    pub analysis_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// How long the saved confirmation stays visible before returning to idle
    #[serde(default = "default_saved_display_delay_ms")]
    pub saved_display_delay_ms: u64,

    /// Upper bound on a single classification; 0 waits forever
    #[serde(default = "default_classification_timeout_ms")]
    pub classification_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct JournalConfig {
    /// IANA timezone used to stamp saved entries
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// User the demo session saves entries for
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl GateConfig {
    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }
}

impl PipelineConfig {
    pub fn saved_display_delay(&self) -> Duration {
        Duration::from_millis(self.saved_display_delay_ms)
    }

    pub fn classification_timeout(&self) -> Option<Duration> {
        match self.classification_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl MoodlensConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("gate.analysis_interval_ms", default_analysis_interval_ms())?
            .set_default(
                "pipeline.saved_display_delay_ms",
                default_saved_display_delay_ms(),
            )?
            .set_default(
                "pipeline.classification_timeout_ms",
                default_classification_timeout_ms(),
            )?
            .set_default("journal.timezone", default_timezone())?
            .set_default("journal.user_id", default_user_id())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides, e.g. MOODLENS_GATE__ANALYSIS_INTERVAL_MS
            .add_source(
                Environment::with_prefix("MOODLENS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: MoodlensConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.analysis_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Gate analysis_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.saved_display_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Pipeline saved_display_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.journal.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Journal timezone '{}' is not a known IANA timezone",
                self.journal.timezone
            )));
        }

        if self.journal.user_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "Journal user_id must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for MoodlensConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig {
                analysis_interval_ms: default_analysis_interval_ms(),
            },
            pipeline: PipelineConfig {
                saved_display_delay_ms: default_saved_display_delay_ms(),
                classification_timeout_ms: default_classification_timeout_ms(),
            },
            journal: JournalConfig {
                timezone: default_timezone(),
                user_id: default_user_id(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_analysis_interval_ms() -> u64 {
    750
}

fn default_saved_display_delay_ms() -> u64 {
    2000
}
fn default_classification_timeout_ms() -> u64 {
    10_000
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_user_id() -> String {
    "local-user".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
