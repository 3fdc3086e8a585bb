//! # Memory Configuration
//!
//! Arena sizes and cache capacities, loaded once at startup from TOML.
//!
//! ```toml
//! [arenas.geometry_vertices]
//! total_size = 67108864
//!
//! [arenas.ui_scratch]
//! total_size = 65536
//! max_entries = 256
//!
//! [caches.texture]
//! max_count = 65536
//!
//! [caches.material]
//! max_count = 4096
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::memory::FreeList;

/// Size of one arena tracked by a free list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Arena size in bytes.
    pub total_size: u64,
    /// Free-list node pool size. Derived from `total_size` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl ArenaConfig {
    /// Creates an arena config with a derived node pool.
    #[inline]
    #[must_use]
    pub const fn new(total_size: u64) -> Self {
        Self {
            total_size,
            max_entries: None,
        }
    }
}

/// Capacity of one resource cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of resident resources (the default resource excluded).
    pub max_count: u32,
}

impl CacheConfig {
    /// Creates a cache config.
    #[inline]
    #[must_use]
    pub const fn new(max_count: u32) -> Self {
        Self { max_count }
    }
}

/// Every arena and cache the engine sets up, keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Arenas by name.
    #[serde(default)]
    pub arenas: BTreeMap<String, ArenaConfig>,
    /// Caches by resource kind.
    #[serde(default)]
    pub caches: BTreeMap<String, CacheConfig>,
}

impl MemoryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if the document does not parse
    /// or names a zero-sized arena or zero-capacity cache.
    pub fn from_toml_str(source: &str) -> MemoryResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| MemoryError::Configuration(format!("Failed to parse memory config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if the file cannot be read or
    /// is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            MemoryError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if serialization fails.
    pub fn to_toml_string(&self) -> MemoryResult<String> {
        toml::to_string(self)
            .map_err(|e| MemoryError::Configuration(format!("Failed to write memory config: {e}")))
    }

    /// Rejects zero-sized arenas, node pools that are empty or larger than the
    /// arena can use, and zero-capacity caches.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] naming the first offending entry.
    pub fn validate(&self) -> MemoryResult<()> {
        for (name, arena) in &self.arenas {
            if arena.total_size == 0 {
                return Err(MemoryError::Configuration(format!(
                    "arena '{name}': total_size must be > 0"
                )));
            }
            if arena.max_entries == Some(0) {
                return Err(MemoryError::Configuration(format!(
                    "arena '{name}': max_entries must be > 0"
                )));
            }
            let useful = FreeList::max_useful_entries(arena.total_size);
            if arena.max_entries.is_some_and(|entries| entries > useful) {
                return Err(MemoryError::Configuration(format!(
                    "arena '{name}': max_entries must be <= {useful} for {}B",
                    arena.total_size
                )));
            }
        }
        for (name, cache) in &self.caches {
            if cache.max_count == 0 {
                return Err(MemoryError::Configuration(format!(
                    "cache '{name}': max_count must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Looks up an arena by name.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if no arena has that name.
    pub fn arena(&self, name: &str) -> MemoryResult<ArenaConfig> {
        self.arenas
            .get(name)
            .copied()
            .ok_or_else(|| MemoryError::Configuration(format!("no arena named '{name}'")))
    }

    /// Looks up a cache by resource kind.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if no cache has that name.
    pub fn cache(&self, kind: &str) -> MemoryResult<CacheConfig> {
        self.caches
            .get(kind)
            .copied()
            .ok_or_else(|| MemoryError::Configuration(format!("no cache named '{kind}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [arenas.vertices]
        total_size = 1048576

        [arenas.scratch]
        total_size = 4096
        max_entries = 32

        [caches.texture]
        max_count = 1024

        [caches.material]
        max_count = 256
    "#;

    #[test]
    fn test_parse_sample() {
        let config = MemoryConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.arena("vertices").unwrap(), ArenaConfig::new(1_048_576));
        assert_eq!(config.arena("scratch").unwrap().max_entries, Some(32));
        assert_eq!(config.cache("texture").unwrap().max_count, 1024);
        assert_eq!(config.cache("material").unwrap().max_count, 256);
    }

    #[test]
    fn test_missing_entries() {
        let config = MemoryConfig::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(config.arena("nope"), Err(MemoryError::Configuration(_))));
        assert!(matches!(config.cache("shader"), Err(MemoryError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = MemoryConfig::from_toml_str("[caches.texture]\nmax_count = 0\n").unwrap_err();
        assert!(err.to_string().contains("texture"));

        let err = MemoryConfig::from_toml_str("[arenas.a]\ntotal_size = 0\n").unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
    }

    #[test]
    fn test_rejects_oversized_node_pool() {
        let source = "[arenas.a]\ntotal_size = 1024\nmax_entries = 9223372036854775807\n";
        let err = MemoryConfig::from_toml_str(source).unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
        assert!(err.to_string().contains("'a'"));

        // The largest pool that can ever be used is accepted.
        let source = "[arenas.a]\ntotal_size = 1024\nmax_entries = 513\n";
        assert!(MemoryConfig::from_toml_str(source).is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(MemoryConfig::from_toml_str("[caches.texture]\nmax_count = \"lots\"\n").is_err());
    }

    #[test]
    fn test_empty_document() {
        let config = MemoryConfig::from_toml_str("").unwrap();
        assert!(config.arenas.is_empty());
        assert!(config.caches.is_empty());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MemoryConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(MemoryConfig::from_toml_str(&text).unwrap(), config);
    }
}
