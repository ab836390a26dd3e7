use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Codec limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest packet accepted by decode and produced by encode (default: 8192)
    ///
    /// RFC 2865 caps packets at 4096 bytes; the default is deliberately
    /// larger to accept oversized packets from NAS devices in the field.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

/// RADIUS header size, the smallest legal packet
pub const MIN_PACKET_SIZE: usize = 20;
/// Ceiling imposed by the 16-bit Length field
pub const LENGTH_FIELD_MAX: usize = u16::MAX as usize;

fn default_max_packet_size() -> usize {
    8192
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            max_packet_size: default_max_packet_size(),
        }
    }
}

impl CodecConfig {
    /// Limits exactly as written in RFC 2865 Section 3
    pub fn rfc2865() -> Self {
        CodecConfig {
            max_packet_size: 4096,
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: CodecConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet_size < MIN_PACKET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_packet_size {} is below the {} byte header",
                self.max_packet_size, MIN_PACKET_SIZE
            )));
        }
        if self.max_packet_size > LENGTH_FIELD_MAX {
            return Err(ConfigError::Invalid(format!(
                "max_packet_size {} does not fit the 16-bit Length field",
                self.max_packet_size
            )));
        }
        Ok(())
    }
}
