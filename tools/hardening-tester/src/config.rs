//! Run configuration.  The `[limits]` section has to mirror what the target server is actually
//! configured with, otherwise the capacity and timeout scenarios measure the wrong thing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest value the 3 byte message length field can carry
const MAX_WIRE_MESSAGE_LENGTH: u32 = 0x00FF_FFFF;

/// Chunk stream ids above this would push the exhaustion scenario past the highest
/// encodable id
const MAX_CHUNK_STREAMS: u32 = 65_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub target: TargetConfig,
    pub limits: LimitsConfig,
    pub timing: TimingConfig,
    pub publish: PublishConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

/// Server side limits the scenarios try to exceed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_connections: usize,
    pub max_connections_per_address: usize,
    pub max_message_size: u32,
    pub max_chunk_streams: u32,
    pub max_nesting_depth: usize,
    pub publish_timeout_ms: u64,
    pub video_data_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

/// Harness pacing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub connect_timeout_ms: u64,
    pub preflight_timeout_ms: u64,
    /// How long to wait after an attack before checking whether the target hung up
    pub settle_delay_ms: u64,
    pub drain_timeout_ms: u64,
    /// Quiet period between scenarios so the target can reclaim connections
    pub cooldown_ms: u64,
    pub timing_slack_ms: u64,
    pub flood_window_ms: u64,
    pub flood_connect_timeout_ms: u64,
    pub accept_pause_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub app_name: String,
    /// An empty name makes the server fall back to the app name as the stream path
    pub stream_name: String,
    pub chunk_size: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            host: "127.0.0.1".to_string(),
            port: 8783,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_connections: 32,
            max_connections_per_address: 16,
            max_message_size: 5 * 1024 * 1024,
            max_chunk_streams: 32,
            max_nesting_depth: 32,
            publish_timeout_ms: 10_000,
            video_data_timeout_ms: 15_000,
            io_timeout_ms: 10_000,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            connect_timeout_ms: 5_000,
            preflight_timeout_ms: 5_000,
            settle_delay_ms: 1_000,
            drain_timeout_ms: 500,
            cooldown_ms: 1_000,
            timing_slack_ms: 2_000,
            flood_window_ms: 3_000,
            flood_connect_timeout_ms: 2_000,
            accept_pause_ms: 200,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            app_name: "stream1".to_string(),
            stream_name: String::new(),
            chunk_size: 128,
        }
    }
}

impl TesterConfig {
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects values that would make scenarios meaningless or make a socket call block
    /// without a bound
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(message: &str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(message.to_string()))
        }

        if self.target.host.trim().is_empty() {
            return invalid("target host cannot be empty");
        }

        if self.target.port == 0 {
            return invalid("target port cannot be 0");
        }

        if self.limits.max_connections == 0 || self.limits.max_connections_per_address == 0 {
            return invalid("connection limits must be at least 1");
        }

        if self.limits.max_message_size == 0
            || self.limits.max_message_size >= MAX_WIRE_MESSAGE_LENGTH / 2
        {
            return invalid("max_message_size must be between 1 and 8388606 bytes");
        }

        if self.limits.max_chunk_streams == 0 || self.limits.max_chunk_streams > MAX_CHUNK_STREAMS
        {
            return invalid("max_chunk_streams must be between 1 and 65000");
        }

        if self.publish.chunk_size == 0 {
            return invalid("publish chunk size cannot be 0");
        }

        let bounded_timeouts = [
            ("io_timeout_ms", self.limits.io_timeout_ms),
            ("connect_timeout_ms", self.timing.connect_timeout_ms),
            ("preflight_timeout_ms", self.timing.preflight_timeout_ms),
            ("drain_timeout_ms", self.timing.drain_timeout_ms),
            ("flood_connect_timeout_ms", self.timing.flood_connect_timeout_ms),
        ];

        for (name, value) in bounded_timeouts.iter() {
            if *value == 0 {
                return Err(ConfigError::Invalid(format!("{} cannot be 0", name)));
            }
        }

        Ok(())
    }

    /// `host:port` of the target
    pub fn target_address(&self) -> String {
        format!("{}:{}", self.target.host, self.target.port)
    }

    /// The cap the max concurrent connections scenario should observe.  All attempts come
    /// from one address, so a per address cap lower than the global one wins.
    pub fn effective_connection_cap(&self) -> usize {
        self.limits
            .max_connections
            .min(self.limits.max_connections_per_address)
    }
}

impl LimitsConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn video_data_timeout(&self) -> Duration {
        Duration::from_millis(self.video_data_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl TimingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_millis(self.preflight_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn timing_slack(&self) -> Duration {
        Duration::from_millis(self.timing_slack_ms)
    }

    pub fn flood_window(&self) -> Duration {
        Duration::from_millis(self.flood_window_ms)
    }

    pub fn flood_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.flood_connect_timeout_ms)
    }

    pub fn accept_pause(&self) -> Duration {
        Duration::from_millis(self.accept_pause_ms)
    }
}
