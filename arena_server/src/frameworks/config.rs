use crate::domain::Tuning;
use std::{
    env, fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

// Runtime/server constants (not gameplay tuning).

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn http_port() -> u16 {
    env_or("ARENA_SERVER_PORT", 3001)
}

pub fn tick_rate_hz() -> u32 {
    env_or("TICK_RATE_HZ", 60)
}

/// Snapshots go out every N ticks (2 at 60 Hz is 30 snapshots a second).
pub fn replication_interval_ticks() -> u32 {
    env_or("REPLICATION_INTERVAL_TICKS", 2)
}

pub fn match_countdown() -> Duration {
    Duration::from_secs(env_or("MATCH_COUNTDOWN_SECS", 3))
}

/// Optional TOML file overriding any subset of the gameplay tuning.
pub fn tuning_path() -> Option<PathBuf> {
    env::var_os("ARENA_TUNING_PATH")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read tuning file {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse tuning file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Stock tuning, or the stock tuning with the file's values laid over it.
pub fn load_tuning(path: Option<&Path>) -> Result<Tuning, ConfigError> {
    let Some(path) = path else {
        return Ok(Tuning::standard());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
