//! Engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Process assessment results concurrently.
    #[serde(default)]
    pub process_parallel: bool,
    /// Max concurrent workers when `process_parallel` is set.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Max statements executed by one conditional branch.
    #[serde(default = "default_max_branch_children")]
    pub max_branch_children: usize,
    /// Synthesize SCORE_TOTAL, SCORE_TOTAL_WEIGHTED and category totals.
    #[serde(default = "default_true")]
    pub derive_totals: bool,
    /// Secondary response-processing behaviour.
    #[serde(default)]
    pub response: ResponseProcessingOptions,
}

/// Option bag for response processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseProcessingOptions {
    /// `stringMatch` case sensitivity when `caseSensitive` is absent.
    #[serde(default = "default_true")]
    pub string_match_case_sensitive: bool,
    /// `substring` case sensitivity when `caseSensitive` is absent.
    #[serde(default = "default_true")]
    pub substring_case_sensitive: bool,
}

impl Default for ResponseProcessingOptions {
    fn default() -> Self {
        Self {
            string_match_case_sensitive: true,
            substring_case_sensitive: true,
        }
    }
}

fn default_parallelism() -> usize {
    4
}
fn default_max_branch_children() -> usize {
    100
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            process_parallel: false,
            parallelism: default_parallelism(),
            max_branch_children: default_max_branch_children(),
            derive_totals: true,
            response: ResponseProcessingOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.process_parallel = enabled;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.parallelism == 0 {
            return Err(ScoringError::InvalidConfig(
                "parallelism must be at least 1".into(),
            ));
        }
        if self.max_branch_children == 0 {
            return Err(ScoringError::InvalidConfig(
                "max_branch_children must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `qtiscore.toml` in the current directory
/// 2. `~/.config/qtiscore/config.toml`
///
/// Environment variable override: `QTISCORE_PROCESS_PARALLEL`.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("qtiscore.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Ok(raw) = std::env::var("QTISCORE_PROCESS_PARALLEL") {
        config.process_parallel = parse_flag(&raw)
            .with_context(|| format!("invalid QTISCORE_PROCESS_PARALLEL value: '{raw}'"))?;
    }

    config.validate()?;
    Ok(config)
}

/// Parse a TOML string into an `EngineConfig`.
pub fn parse_config_str(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(content).context("failed to parse TOML")?;
    Ok(config)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean flag, got '{other}'"),
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("qtiscore"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert!(!config.process_parallel);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_branch_children, 100);
        assert!(config.derive_totals);
        assert!(config.response.string_match_case_sensitive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config_str(
            r#"
process_parallel = true
max_branch_children = 10

[response]
string_match_case_sensitive = false
"#,
        )
        .unwrap();
        assert!(config.process_parallel);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_branch_children, 10);
        assert!(!config.response.string_match_case_sensitive);
        assert!(config.response.substring_case_sensitive);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = EngineConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScoringError::InvalidConfig(_))
        ));
    }

    #[test]
    fn explicit_missing_path_fails() {
        let result = load_config_from(Some(Path::new("/nonexistent/qtiscore.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qtiscore.toml");
        std::fs::write(&path, "derive_totals = false\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert!(!config.derive_totals);
    }

    #[test]
    fn flags_parse() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
