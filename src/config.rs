//! Configuration file loading and the ignore policy.
//!
//! The configuration is a YAML document with a single recognized key:
//!
//! ```yaml
//! ignore:
//!   - "**/*_test.go"
//!   - "**/mock/**"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Config file names looked up in the current directory, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &[
    ".unused-interface-methods.yml",
    "unused-interface-methods.yml",
    ".config/unused-interface-methods.yml",
    ".unused-interface-methods.yaml",
    "unused-interface-methods.yaml",
    ".config/unused-interface-methods.yaml",
];

/// Built-in ignore patterns used when no config overrides them.
pub const DEFAULT_IGNORE: &[&str] = &[
    "**/*_test.go",
    "test/**",
    "**/*_mock.go",
    "**/mock/**",
    "**/mocks/**",
];

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect()
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Glob patterns (double-star aware) for files excluded from analysis.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    ///
    /// An empty file yields the defaults. A present `ignore` key replaces the
    /// default patterns rather than extending them.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config from an explicit path, or discover one.
    ///
    /// Returns the defaults when nothing is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => match discover_config() {
                Some(path) => {
                    tracing::debug!(config = %path.display(), "using config file");
                    Self::parse_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Compile the ignore patterns into a policy.
    pub fn ignore_policy(&self) -> Result<IgnorePolicy, ConfigError> {
        IgnorePolicy::new(&self.ignore)
    }
}

/// Discover a config file relative to the current directory, falling back to
/// the per-user config directory.
pub fn discover_config() -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let dirs = directories::ProjectDirs::from("", "", "unused-interface-methods")?;
    ["config.yml", "config.yaml"]
        .iter()
        .map(|name| dirs.config_dir().join(name))
        .find(|path| path.is_file())
}

/// Compiled ignore patterns.
///
/// Paths are matched relative to the analyzed root with `/` separators.
#[derive(Debug, Clone)]
pub struct IgnorePolicy {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnorePolicy {
    /// Compile a list of glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::Pattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set,
        })
    }

    /// A policy that ignores nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// The source patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a root-relative path is excluded from analysis.
    pub fn should_ignore<P: AsRef<Path>>(&self, path: P) -> bool {
        let normalized = normalize(path.as_ref());
        !normalized.is_empty() && self.set.is_match(normalized.as_str())
    }
}

/// Render a relative path with `/` separators and no `./` components.
pub fn normalize(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_policy() {
        let policy = Config::default().ignore_policy().unwrap();

        assert!(policy.should_ignore("pkg/service_test.go"));
        assert!(policy.should_ignore("service_test.go"));
        assert!(policy.should_ignore("test/data/interfaces.go"));
        assert!(policy.should_ignore("pkg/mock/logger.go"));
        assert!(policy.should_ignore("mock/logger.go"));
        assert!(policy.should_ignore("internal/mocks/store.go"));
        assert!(policy.should_ignore("store_mock.go"));

        assert!(!policy.should_ignore("pkg/service.go"));
        assert!(!policy.should_ignore("internal/testing/helpers.go"));
        assert!(!policy.should_ignore("pkg/mockery.go"));
    }

    #[test]
    fn test_normalized_matching() {
        let policy = IgnorePolicy::new(&["gen/**"]).unwrap();
        assert!(policy.should_ignore("./gen/api.go"));
        assert!(!policy.should_ignore("src/gen.go"));
    }

    #[test]
    fn test_parse_replaces_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.yml");
        std::fs::write(&path, "ignore:\n  - \"**/generated/**\"\n").unwrap();

        let config = Config::parse_file(&path).unwrap();
        assert_eq!(config.ignore, vec!["**/generated/**".to_string()]);

        let policy = config.ignore_policy().unwrap();
        assert!(policy.should_ignore("api/generated/types.go"));
        assert!(!policy.should_ignore("api/types_test.go"));
    }

    #[test]
    fn test_parse_missing_key_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.yml");
        std::fs::write(&path, "other: true\n").unwrap();

        let config = Config::parse_file(&path).unwrap();
        assert_eq!(config.ignore.len(), DEFAULT_IGNORE.len());
    }

    #[test]
    fn test_parse_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.yml");
        std::fs::write(&path, "\n").unwrap();

        let config = Config::parse_file(&path).unwrap();
        assert_eq!(config.ignore.len(), DEFAULT_IGNORE.len());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg.yml");
        std::fs::write(&path, "ignore: [unterminated\n").unwrap();

        let err = Config::parse_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/cfg.yml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = IgnorePolicy::new(&["a/[b"]).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }
}
