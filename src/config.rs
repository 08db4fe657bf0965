//! Configuration management for scanshelf

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{MemoryBudget, DEFAULT_FRACTION};
use crate::coordinator::{CoordinatorOptions, RENDER_CONCURRENCY, RENDER_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct Config {
    pub library: LibraryConfig,
    pub cache: CacheConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub dir: PathBuf,
    /// Keep deletion markers on disk across restarts
    pub persist_deletions: bool,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Explicit budget; wins over `fraction`
    pub bytes: Option<usize>,
    /// Budget as 1/fraction of physical memory
    pub fraction: usize,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub max_dimension: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            library: LibraryConfig {
                dir: PathBuf::from("./documents"),
                persist_deletions: false,
            },
            cache: CacheConfig {
                bytes: None,
                fraction: DEFAULT_FRACTION,
            },
            render: RenderConfig {
                timeout_secs: RENDER_TIMEOUT_SECS,
                concurrency: RENDER_CONCURRENCY,
                max_dimension: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Config {
            library: LibraryConfig {
                dir: lookup("SCANSHELF_LIBRARY_DIR")
                    .filter(|dir| !dir.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.library.dir),
                persist_deletions: parse_or(
                    &lookup,
                    "SCANSHELF_PERSIST_DELETIONS",
                    defaults.library.persist_deletions,
                ),
            },
            cache: CacheConfig {
                bytes: parse_optional(&lookup, "SCANSHELF_CACHE_BYTES"),
                fraction: parse_or(&lookup, "SCANSHELF_CACHE_FRACTION", defaults.cache.fraction),
            },
            render: RenderConfig {
                timeout_secs: parse_or(
                    &lookup,
                    "SCANSHELF_RENDER_TIMEOUT_SECS",
                    defaults.render.timeout_secs,
                ),
                concurrency: parse_or(
                    &lookup,
                    "SCANSHELF_RENDER_CONCURRENCY",
                    defaults.render.concurrency,
                ),
                max_dimension: parse_optional(&lookup, "SCANSHELF_MAX_RENDER_DIMENSION"),
            },
        }
    }

    pub fn cache_budget(&self) -> MemoryBudget {
        MemoryBudget::resolve(self.cache.bytes, self.cache.fraction)
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            render_timeout: Duration::from_secs(self.render.timeout_secs),
            concurrency: self.render.concurrency.max(1),
            max_dimension: self.render.max_dimension,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parse_optional(lookup, key).unwrap_or(default)
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = key, value = raw, "Invalid config value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.library.dir, PathBuf::from("./documents"));
        assert!(!config.library.persist_deletions);
        assert_eq!(config.cache.bytes, None);
        assert_eq!(config.cache.fraction, 8);
        assert_eq!(config.render.timeout_secs, 30);
        assert_eq!(config.render.concurrency, 4);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SCANSHELF_LIBRARY_DIR", "/srv/scans"),
            ("SCANSHELF_CACHE_BYTES", "1048576"),
            ("SCANSHELF_MAX_RENDER_DIMENSION", "1600"),
            ("SCANSHELF_PERSIST_DELETIONS", "true"),
        ]);
        assert_eq!(config.library.dir, PathBuf::from("/srv/scans"));
        assert!(config.library.persist_deletions);
        assert_eq!(config.cache_budget().bytes, 1_048_576);
        assert_eq!(config.coordinator_options().max_dimension, Some(1600));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config(&[
            ("SCANSHELF_RENDER_TIMEOUT_SECS", "soon"),
            ("SCANSHELF_CACHE_BYTES", "-1"),
            ("SCANSHELF_RENDER_CONCURRENCY", "0"),
        ]);
        assert_eq!(config.render.timeout_secs, 30);
        assert_eq!(config.cache.bytes, None);
        assert_eq!(config.coordinator_options().concurrency, 1);
    }
}
