//! relgraph Core - Domain models, errors and shared configuration
//!
//! This crate defines the abstractions used throughout relgraph:
//! - The canonical `Triple` record shared by extraction, tabular
//!   normalization and graph construction
//! - The error taxonomy and its user-facing report form
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, ExtractionConfig, GraphConfig, LoggingConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for relgraph operations
#[derive(Error, Debug)]
pub enum RelgraphError {
    /// The document source could not be brought up. Persistent until restart.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid pattern configuration: {0}")]
    PatternConfig(String),

    /// The document source failed on one particular input
    #[error("Annotation failed: {0}")]
    Annotation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelgraphError {
    /// Short machine-readable category for this error
    pub fn category(&self) -> &'static str {
        match self {
            Self::Initialization(_) => "initialization_error",
            Self::Validation(_) => "validation_error",
            Self::PatternConfig(_) => "pattern_config_error",
            Self::Annotation(_) => "annotation_error",
            Self::Parse(_) => "parse_error",
            Self::Io(_) => "io_error",
            Self::Config(_) => "config_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// Convert into the serializable report handed to callers
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport::new(self.category(), self.to_string())
    }
}

impl From<ConfigError> for RelgraphError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelgraphError>;

/// User-facing error payload: a category code plus a readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&RelgraphError> for ErrorReport {
    fn from(err: &RelgraphError) -> Self {
        err.to_report()
    }
}

// ============================================================================
// Triples
// ============================================================================

/// A subject–relation–object fact with optional provenance metadata
///
/// Serialized as a flat field map; absent optionals become `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,

    /// Type of the subject entity (e.g. "person")
    #[serde(default)]
    pub subject_type: Option<String>,

    /// Type of the object entity
    #[serde(default)]
    pub object_type: Option<String>,

    /// Knowledge domain the fact belongs to (e.g. "physics")
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub start_year: Option<i32>,

    #[serde(default)]
    pub end_year: Option<i32>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl Triple {
    /// Create a triple with no metadata
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
            subject_type: None,
            object_type: None,
            domain: None,
            country: None,
            start_year: None,
            end_year: None,
            notes: None,
        }
    }

    /// Set entity types
    pub fn with_types(
        mut self,
        subject_type: Option<String>,
        object_type: Option<String>,
    ) -> Self {
        self.subject_type = subject_type;
        self.object_type = object_type;
        self
    }

    /// Set domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set country
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Set the active year range
    pub fn with_years(mut self, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }

    /// Set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True when subject, relation and object are all non-empty after trimming
    pub fn is_complete(&self) -> bool {
        !self.subject.trim().is_empty()
            && !self.relation.trim().is_empty()
            && !self.object.trim().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
