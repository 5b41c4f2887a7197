//! relgraph Parser - Tabular ingestion and triple normalization
//!
//! Supports reading tables from:
//! - CSV and TSV files
//! - Microsoft Excel (XLSX, XLS)
//!
//! Each parser implements the `TableParser` trait and produces a `Table`
//! that `normalize` turns into canonical triples.

use std::path::Path;

use relgraph_core::RelgraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod csv;
pub mod excel;
pub mod normalize;

pub use crate::csv::{write_triples, write_triples_to_path, CsvParser, TRIPLE_COLUMNS};
pub use excel::ExcelParser;
pub use normalize::normalize;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading tabular files
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(String),

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// Requested worksheet does not exist
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The file holds no header row
    #[error("Table has no header row: {0}")]
    MissingHeader(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for RelgraphError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::IoError { source, .. } => RelgraphError::Io(source),
            ParserError::UnsupportedFormat(_) => RelgraphError::Validation(err.to_string()),
            other => RelgraphError::Parse(other.to_string()),
        }
    }
}

// ============================================================================
// File Types
// ============================================================================

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Tsv,
    Xlsx,
    Xls,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => Self::Csv,
            "tsv" | "tab" => Self::Tsv,
            "xlsx" | "xlsm" => Self::Xlsx,
            "xls" => Self::Xls,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Tsv => write!(f, "tsv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

/// A table with named columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Table caption/title (sheet name for workbooks)
    pub caption: Option<String>,

    /// Column headers
    pub headers: Vec<String>,

    /// Table rows; short rows are padded with empty cells by `cell`
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a new table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add headers
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Set caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Add a row
    pub fn add_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// Get number of columns
    pub fn num_columns(&self) -> usize {
        self.headers
            .len()
            .max(self.rows.first().map(|r| r.len()).unwrap_or(0))
    }

    /// Get number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first column whose trimmed header equals `name`,
    /// ignoring case
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
    }

    /// Cell at (`row`, `column`); missing cells read as empty
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for table parsers
pub trait TableParser: Send + Sync {
    /// Parse a table from a file path
    fn parse(&self, path: &Path) -> Result<Table>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Parse a table, choosing the parser by file extension
///
/// `sheet` selects a worksheet for workbooks and is ignored for text formats.
pub fn parse_path(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let file_type = FileType::from_path(path);
    tracing::debug!(path = %path.display(), file_type = %file_type, "parsing table");

    let table = match file_type {
        FileType::Csv => CsvParser::new().parse(path)?,
        FileType::Tsv => CsvParser::tsv().parse(path)?,
        FileType::Xlsx | FileType::Xls => {
            let parser = match sheet {
                Some(name) => ExcelParser::new().with_sheet(name),
                None => ExcelParser::new(),
            };
            parser.parse(path)?
        }
        FileType::Unknown => {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ))
        }
    };

    tracing::info!(
        path = %path.display(),
        columns = table.num_columns(),
        rows = table.num_rows(),
        "parsed table"
    );
    Ok(table)
}

// ============================================================================
// Tests
// ============================================================================
