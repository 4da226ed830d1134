//! Configuration system
//!
//! Two independent configuration surfaces, matching the two kinds the spec
//! names in §6: a structured, serde-driven [`frame_config::FrameConfig`]
//! loaded once at startup, and a flat `key=value` [`cvar`] registry that can
//! be round-tripped to disk across runs.

pub mod cvar;
pub mod frame_config;

pub use serde::{Deserialize, Serialize};

/// Configuration trait for structured, serde-backed config types.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file, inferring format from the extension.
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file, inferring format from the extension.
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Unsupported file format
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A cvar line could not be parsed (§6 persisted config file)
    #[error("malformed cvar entry on line {line}: {text}")]
    MalformedCvar {
        /// 1-based line number within the file
        line: usize,
        /// The offending line, verbatim
        text: String,
    },
}
