/// Default slot step in minutes
pub const DEFAULT_GRANULARITY_MINUTES: u32 = 30;

/// Default period between refetches when live updates are unavailable
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const DEFAULT_STORE_PATH: &str = "~/.local/share/meetgrid/store.json";

pub const CONFIG_DIR_NAME: &str = "meetgrid";

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix for environment overrides, e.g. MEETGRID_GRANULARITY_MINUTES
pub const ENV_PREFIX: &str = "MEETGRID";

pub const MINUTES_PER_DAY: u32 = 24 * 60;
