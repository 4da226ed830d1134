//! Persisted `key=value` configuration file (spec §6)
//!
//! A flat text format, one `key=value` pair per line, `#` starting a
//! comment line. The teacher has no precedent for this shape (its
//! `Config` trait only speaks serde formats), so this parser is new,
//! written in the teacher's error-handling idiom.

use std::collections::HashMap;
use std::fmt;

use super::ConfigError;

/// A single cvar's value, narrowed to the kinds the recognized options use.
#[derive(Debug, Clone, PartialEq)]
pub enum CvarValue {
    /// Boolean flag, written as `true`/`false`.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Opaque string value (e.g. `"1920x1080"`).
    String(String),
}

impl fmt::Display for CvarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

impl CvarValue {
    /// Parse a raw string into the narrowest matching variant: `bool`,
    /// then `i64`, then `f64`, falling back to a plain string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<bool>() {
            return Self::Bool(v);
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return Self::Float(v);
        }
        Self::String(raw.to_string())
    }
}

/// One entry in the registry: a value plus whether it is written back on save.
#[derive(Debug, Clone, PartialEq)]
pub struct CvarEntry {
    /// Current value.
    pub value: CvarValue,
    /// Only archived entries are persisted by `save_to_string`/`save_to_file`.
    pub archived: bool,
}

/// Recognized cvar names, listed so callers can archive the defaults the
/// engine ships with (spec §6). Unrecognized keys are still accepted.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "r_vsync",
    "r_msaa",
    "r_resolution",
    "r_fullscreen",
    "r_texture_quality",
    "audio_master",
    "debug_log_level",
    "r_trackMemory",
    "r_frame_arena_size_mb",
];

/// In-memory registry of cvars, loaded from and saved back to a flat
/// `key=value` text file.
#[derive(Debug, Clone, Default)]
pub struct CvarRegistry {
    entries: HashMap<String, CvarEntry>,
}

impl CvarRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from `key=value` text, `#` lines ignored as comments.
    ///
    /// Every parsed entry is marked `archived = true`: anything present in
    /// a loaded file is, by definition, something a previous save wrote
    /// back, so it round-trips on the next save.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedCvar {
                    line: idx + 1,
                    text: raw_line.to_string(),
                });
            };

            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(ConfigError::MalformedCvar {
                    line: idx + 1,
                    text: raw_line.to_string(),
                });
            }

            entries.insert(
                key.to_string(),
                CvarEntry {
                    value: CvarValue::parse(value),
                    archived: true,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Load a registry from a file on disk.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Set or insert a cvar's value, defaulting new entries to archived.
    pub fn set(&mut self, key: &str, value: CvarValue) {
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| entry.value = value.clone())
            .or_insert(CvarEntry {
                value,
                archived: true,
            });
    }

    /// Look up a cvar's current value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CvarValue> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Mark whether a cvar is written back on save.
    pub fn set_archived(&mut self, key: &str, archived: bool) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.archived = archived;
        }
    }

    /// Serialize the archived subset of the registry to `key=value` text,
    /// one line per entry, sorted by key for a deterministic byte-identical
    /// round trip (spec §8).
    #[must_use]
    pub fn save_to_string(&self) -> String {
        let mut keys: Vec<&String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.archived)
            .map(|(key, _)| key)
            .collect();
        keys.sort();

        let mut out = String::new();
        for key in keys {
            let entry = &self.entries[key];
            out.push_str(key);
            out.push('=');
            out.push_str(&entry.value.to_string());
            out.push('\n');
        }
        out
    }

    /// Save the archived subset of the registry to a file.
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        std::fs::write(path, self.save_to_string()).map_err(ConfigError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_types() {
        let registry = CvarRegistry::parse(
            "# comment\nr_vsync=true\nr_msaa=4\naudio_master=0.75\nr_resolution=1920x1080\n",
        )
        .expect("parse");

        assert_eq!(registry.get("r_vsync"), Some(&CvarValue::Bool(true)));
        assert_eq!(registry.get("r_msaa"), Some(&CvarValue::Int(4)));
        assert_eq!(registry.get("audio_master"), Some(&CvarValue::Float(0.75)));
        assert_eq!(
            registry.get("r_resolution"),
            Some(&CvarValue::String("1920x1080".to_string()))
        );
    }

    #[test]
    fn malformed_line_is_rejected() {
        let result = CvarRegistry::parse("r_vsync true\n");
        assert!(matches!(result, Err(ConfigError::MalformedCvar { line: 1, .. })));
    }

    #[test]
    fn save_then_load_then_save_is_byte_identical_for_archived_entries() {
        let mut registry = CvarRegistry::new();
        registry.set("r_vsync", CvarValue::Bool(true));
        registry.set("r_msaa", CvarValue::Int(4));
        registry.set("debug_log_level", CvarValue::Int(2));

        let first_save = registry.save_to_string();

        let reloaded = CvarRegistry::parse(&first_save).expect("reparse");
        let second_save = reloaded.save_to_string();

        assert_eq!(first_save, second_save);
    }

    #[test]
    fn unarchived_entries_are_not_persisted() {
        let mut registry = CvarRegistry::new();
        registry.set("r_vsync", CvarValue::Bool(true));
        registry.set_archived("r_vsync", false);

        assert_eq!(registry.save_to_string(), "");
    }
}
