//! CSV / TSV table parser and triple export
//!
//! The first record is the header row. Records may be ragged; missing
//! trailing cells read as empty.

use std::io::{Read, Write};
use std::path::Path;

use relgraph_core::Triple;

use crate::{FileType, ParserError, Result, Table, TableParser};

/// Header written by `write_triples`; `normalize` reads it back unchanged
pub const TRIPLE_COLUMNS: [&str; 10] = [
    "subject",
    "relation",
    "object",
    "subject_type",
    "object_type",
    "domain",
    "country",
    "start_year",
    "end_year",
    "notes",
];

/// Delimited text parser
#[derive(Debug, Clone)]
pub struct CsvParser {
    /// Field delimiter
    pub delimiter: u8,
}

impl CsvParser {
    /// Comma-separated parser
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Tab-separated parser
    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a table from any reader
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<Table> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| ParserError::CsvError(e.to_string()))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ParserError::MissingHeader("empty header row".to_string()));
        }

        let mut table = Table::new().with_headers(headers.iter());
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                // +2: one for the header, one for 1-based numbering
                ParserError::CsvError(format!("record {}: {e}", line + 2))
            })?;
            table.add_row(record.iter());
        }

        Ok(table)
    }

    /// Read a table from raw bytes (an uploaded file body)
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Table> {
        self.from_reader(bytes)
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for CsvParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let file = std::fs::File::open(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut table = self.from_reader(std::io::BufReader::new(file))?;
        table.caption = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Csv, FileType::Tsv]
    }
}

// ============================================================================
// Export
// ============================================================================

/// Write triples as CSV with a `TRIPLE_COLUMNS` header; absent fields are empty
pub fn write_triples<W: Write>(writer: W, triples: &[Triple]) -> Result<()> {
    let mut writer = ::csv::Writer::from_writer(writer);
    let csv_err = |e: ::csv::Error| ParserError::CsvError(e.to_string());

    writer.write_record(TRIPLE_COLUMNS).map_err(csv_err)?;
    for triple in triples {
        let year = |y: Option<i32>| y.map(|y| y.to_string()).unwrap_or_default();
        writer
            .write_record([
                triple.subject.as_str(),
                triple.relation.as_str(),
                triple.object.as_str(),
                triple.subject_type.as_deref().unwrap_or(""),
                triple.object_type.as_deref().unwrap_or(""),
                triple.domain.as_deref().unwrap_or(""),
                triple.country.as_deref().unwrap_or(""),
                &year(triple.start_year),
                &year(triple.end_year),
                triple.notes.as_deref().unwrap_or(""),
            ])
            .map_err(csv_err)?;
    }

    writer
        .flush()
        .map_err(|e| ParserError::CsvError(format!("flushing output: {e}")))
}

/// Write triples to a CSV file, replacing it
pub fn write_triples_to_path(path: &Path, triples: &[Triple]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| ParserError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    write_triples(std::io::BufWriter::new(file), triples)?;
    tracing::info!(path = %path.display(), triples = triples.len(), "wrote triples");
    Ok(())
}
