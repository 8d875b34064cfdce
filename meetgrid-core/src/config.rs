//! Global meetgrid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_GRANULARITY_MINUTES, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_STORE_PATH, ENV_PREFIX,
};
use crate::error::{MeetGridError, MeetGridResult};
use crate::grid::{Granularity, GridBuilder};
use crate::session::SessionOptions;
use crate::sync::{SyncOptions, SyncStrategy};

fn default_granularity_minutes() -> u32 {
    DEFAULT_GRANULARITY_MINUTES
}

fn default_poll_interval() -> String {
    format!("{}s", DEFAULT_POLL_INTERVAL_SECS)
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Configuration at ~/.config/meetgrid/config.toml, overridable through
/// `MEETGRID_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetGridConfig {
    #[serde(default = "default_granularity_minutes")]
    pub granularity_minutes: u32,

    /// Humantime duration, e.g. "5s" or "1m 30s".
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub sync_strategy: SyncStrategy,
}

impl Default for MeetGridConfig {
    fn default() -> Self {
        MeetGridConfig {
            granularity_minutes: default_granularity_minutes(),
            poll_interval: default_poll_interval(),
            store_path: default_store_path(),
            sync_strategy: SyncStrategy::default(),
        }
    }
}

impl MeetGridConfig {
    pub fn config_path() -> MeetGridResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MeetGridError::Config("Could not determine config directory".into()))?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, writing a commented template there on
    /// first use.
    pub fn load() -> MeetGridResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from a specific file (which may be missing), then apply
    /// environment overrides.
    pub fn load_from(path: &Path) -> MeetGridResult<Self> {
        let config: MeetGridConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| MeetGridError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| MeetGridError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> MeetGridResult<()> {
        let contents = format!(
            "\
# meetgrid configuration

# Minutes between grid slots (must divide a day evenly):
# granularity_minutes = {}

# How often to refetch when live updates are unavailable:
# poll_interval = \"{}\"

# Where the shared availability store lives:
# store_path = \"{}\"

# How remote changes are applied: \"refetch\" or \"incremental\"
# sync_strategy = \"refetch\"
",
            DEFAULT_GRANULARITY_MINUTES,
            default_poll_interval(),
            DEFAULT_STORE_PATH
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MeetGridError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| MeetGridError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn validate(&self) -> MeetGridResult<()> {
        self.granularity()?;
        self.poll_interval()?;
        Ok(())
    }

    pub fn granularity(&self) -> MeetGridResult<Granularity> {
        Granularity::from_minutes(self.granularity_minutes)
    }

    pub fn poll_interval(&self) -> MeetGridResult<Duration> {
        let interval = humantime::parse_duration(&self.poll_interval).map_err(|e| {
            MeetGridError::Config(format!("Invalid poll_interval '{}': {e}", self.poll_interval))
        })?;
        if interval.is_zero() {
            return Err(MeetGridError::Config("poll_interval must be positive".into()));
        }
        Ok(interval)
    }

    /// Store location with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.store_path.to_string_lossy()).into_owned();
        PathBuf::from(full_path_str)
    }

    pub fn with_granularity(mut self, minutes: u32) -> MeetGridResult<Self> {
        Granularity::from_minutes(minutes)?;
        self.granularity_minutes = minutes;
        Ok(self)
    }

    pub fn grid_builder(&self) -> MeetGridResult<GridBuilder> {
        Ok(GridBuilder::new(self.granularity()?))
    }

    pub fn sync_options(&self) -> MeetGridResult<SyncOptions> {
        Ok(SyncOptions {
            strategy: self.sync_strategy,
            poll_interval: self.poll_interval()?,
        })
    }

    pub fn session_options(&self) -> MeetGridResult<SessionOptions> {
        Ok(SessionOptions {
            granularity: self.granularity()?,
            sync: self.sync_options()?,
        })
    }
}
