//! Pipeline configuration, read from a `bunnrensk.toml` file.

use crate::error::BunnrenskError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a not-detected marker ("n.d.", "ikke påvist") turns into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotDetectedPolicy {
    /// Value 0, below-limit, no loq.
    #[default]
    Zero,
    /// No measurement; the row is reported as missing.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// E.g. "09_moanetunnelen". Stamped on derived samples and used for
    /// fallback sample ids.
    pub project_code: Option<String>,
    /// Overrides the threshold table's own basis string.
    pub classification_basis: Option<String>,
    pub not_detected: NotDetectedPolicy,
    /// Alias overlays applied on top of the base table, in order.
    pub overlays: Vec<String>,
    /// Custom threshold table (JSON). The embedded TA-2553/2009 table otherwise.
    pub thresholds: Option<PathBuf>,
    pub tunnel_name: Option<String>,
    pub sampler: Option<String>,
}

fn default_overlays() -> Vec<String> {
    vec!["als".to_string(), "eurofins".to_string()]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            project_code: None,
            classification_basis: None,
            not_detected: NotDetectedPolicy::Zero,
            overlays: default_overlays(),
            thresholds: None,
            tunnel_name: None,
            sampler: None,
        }
    }
}

/// Load a config file. Relative `thresholds` paths resolve against the
/// config file's directory.
pub fn load_config(path: &Path) -> Result<PipelineConfig, BunnrenskError> {
    let content = std::fs::read_to_string(path).map_err(|e| BunnrenskError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut config = parse_config_str(&content).map_err(|e| BunnrenskError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let (Some(thresholds), Some(dir)) = (config.thresholds.as_ref(), path.parent()) {
        if thresholds.is_relative() {
            config.thresholds = Some(dir.join(thresholds));
        }
    }
    Ok(config)
}

pub fn parse_config_str(toml_str: &str) -> Result<PipelineConfig, BunnrenskError> {
    Ok(toml::from_str(toml_str)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.overlays, vec!["als", "eurofins"]);
        assert_eq!(config.not_detected, NotDetectedPolicy::Zero);
    }

    #[test]
    fn parses_all_keys() {
        let config = parse_config_str(
            r#"
            project_code = "09_moanetunnelen"
            classification_basis = "TA-2553/2009 (revidert)"
            not_detected = "missing"
            overlays = ["als"]
            tunnel_name = "Moanetunnelen"
            sampler = "NGI"
            "#,
        )
        .unwrap();
        assert_eq!(config.project_code.as_deref(), Some("09_moanetunnelen"));
        assert_eq!(config.not_detected, NotDetectedPolicy::Missing);
        assert_eq!(config.overlays, vec!["als"]);
        assert_eq!(config.tunnel_name.as_deref(), Some("Moanetunnelen"));
    }

    #[test]
    fn unknown_policy_rejected() {
        assert!(parse_config_str(r#"not_detected = "half""#).is_err());
    }

    #[test]
    fn relative_threshold_path_resolves_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bunnrensk.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, r#"thresholds = "custom.json""#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.thresholds, Some(dir.path().join("custom.json")));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config(Path::new("/nonexistent/bunnrensk.toml")).unwrap_err();
        assert!(matches!(err, BunnrenskError::Config { .. }));
    }
}
