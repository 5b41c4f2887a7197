//! relgraph Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for local use.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Text extraction configuration
    pub extraction: ExtractionConfig,

    /// Graph query defaults
    pub graph: GraphConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_vars(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply `RELGRAPH_*` style variables resolved through `lookup`
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Extraction
        if let Some(path) = lookup("RELGRAPH_RULES_FILE") {
            self.extraction.rules_file = Some(PathBuf::from(path));
        }
        if let Some(command) = lookup("RELGRAPH_ANNOTATOR") {
            self.extraction.annotator_command = Some(command);
        }
        if let Some(args) = lookup("RELGRAPH_ANNOTATOR_ARGS") {
            self.extraction.annotator_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(model) = lookup("RELGRAPH_ANNOTATOR_MODEL") {
            self.extraction.annotator_model = Some(PathBuf::from(model));
        }

        // Graph
        if let Some(value) = lookup("RELGRAPH_MAX_NODES") {
            self.graph.max_nodes = parse_var("RELGRAPH_MAX_NODES", value)?;
        }
        if let Some(value) = lookup("RELGRAPH_MIN_DEGREE") {
            self.graph.min_degree = parse_var("RELGRAPH_MIN_DEGREE", value)?;
        }
        if let Some(value) = lookup("RELGRAPH_FOCUS_HOPS") {
            self.graph.focus_hops = parse_var("RELGRAPH_FOCUS_HOPS", value)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("RELGRAPH_LOG_JSON") {
            self.logging.json_format = parse_var("RELGRAPH_LOG_JSON", value)?;
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Optional rule file replacing the built-in rule set
    pub rules_file: Option<PathBuf>,

    /// External annotator program producing CoNLL-U on stdout
    pub annotator_command: Option<String>,

    /// Arguments passed to the annotator program
    pub annotator_args: Vec<String>,

    /// Model file the annotator needs; checked once at initialization
    pub annotator_model: Option<PathBuf>,
}

/// Defaults for graph queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Node cap applied after every query stage
    pub max_nodes: usize,

    /// Minimum total degree kept by the degree filter (0 disables it)
    pub min_degree: i64,

    /// Breadth-first rounds used when focusing on a node
    pub focus_hops: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_nodes: 300,
            min_degree: 0,
            focus_hops: 1,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.graph.max_nodes, 300);
        assert_eq!(config.graph.min_degree, 0);
        assert_eq!(config.graph.focus_hops, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.extraction.annotator_command.is_none());
    }

    #[test]
    fn test_apply_vars() {
        let mut config = AppConfig::default();
        config
            .apply_vars(lookup(&[
                ("RELGRAPH_ANNOTATOR", "udpipe"),
                ("RELGRAPH_ANNOTATOR_ARGS", "--tokenize --tag --parse"),
                ("RELGRAPH_MAX_NODES", "50"),
                ("RELGRAPH_LOG_JSON", "true"),
            ]))
            .unwrap();

        assert_eq!(config.extraction.annotator_command.as_deref(), Some("udpipe"));
        assert_eq!(config.extraction.annotator_args.len(), 3);
        assert_eq!(config.graph.max_nodes, 50);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_invalid_var_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_vars(lookup(&[("RELGRAPH_MAX_NODES", "lots")]))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RELGRAPH_MAX_NODES"));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[graph]\nmax_nodes = 25\n\n[extraction]\nannotator_command = \"spacy-conllu\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.graph.max_nodes, 25);
        assert_eq!(config.graph.focus_hops, 1);
        assert_eq!(
            config.extraction.annotator_command.as_deref(),
            Some("spacy-conllu")
        );
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/relgraph.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
