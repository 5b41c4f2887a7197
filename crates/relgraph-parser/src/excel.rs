//! Excel table parser using calamine
//!
//! Reads one worksheet of an XLSX/XLS workbook as a table: the first
//! worksheet by default, or a named one.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{FileType, ParserError, Result, Table, TableParser};

/// Excel table parser
#[derive(Debug, Clone)]
pub struct ExcelParser {
    /// Sheet to read (None = first sheet)
    pub sheet: Option<String>,
    /// Whether to treat first row as header
    pub first_row_header: bool,
}

impl ExcelParser {
    /// Create a new Excel parser with default settings
    pub fn new() -> Self {
        Self {
            sheet: None,
            first_row_header: true,
        }
    }

    /// Read a specific sheet
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Set whether first row is treated as header
    pub fn with_first_row_header(mut self, enabled: bool) -> Self {
        self.first_row_header = enabled;
        self
    }

    /// Convert a Data cell to string
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => {
                // whole floats are how workbooks store years
                if f.fract() == 0.0 {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Data::Int(i) => format!("{i}"),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::Error(e) => format!("#ERROR: {e:?}"),
            Data::DateTime(dt) => format!("{dt}"),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }

    /// Turn a worksheet range into a table
    fn process_sheet(&self, sheet_name: &str, range: calamine::Range<Data>) -> Table {
        let mut table = Table::new().with_caption(sheet_name);
        let mut rows_iter = range.rows();

        if self.first_row_header {
            if let Some(first_row) = rows_iter.next() {
                table.headers = first_row.iter().map(Self::cell_to_string).collect();
            }
        }

        // blank rows are layout, not data
        table.rows = rows_iter
            .map(|row| row.iter().map(Self::cell_to_string).collect::<Vec<_>>())
            .filter(|row_data: &Vec<String>| !row_data.iter().all(|s| s.trim().is_empty()))
            .collect();

        table
    }
}

impl Default for ExcelParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for ExcelParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet_name = match &self.sheet {
            Some(wanted) => sheet_names
                .iter()
                .find(|name| *name == wanted)
                .cloned()
                .ok_or_else(|| ParserError::SheetNotFound(wanted.clone()))?,
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ParserError::ExcelError("workbook has no sheets".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let table = self.process_sheet(&sheet_name, range);
        if self.first_row_header && table.headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ParserError::MissingHeader(sheet_name));
        }

        tracing::debug!(
            sheet = %sheet_name,
            sheets = sheet_names.len(),
            rows = table.num_rows(),
            "read worksheet"
        );
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Xlsx, FileType::Xls]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Range;

    #[test]
    fn test_excel_parser_creation() {
        let parser = ExcelParser::new();
        assert!(parser.first_row_header);
        assert!(parser.sheet.is_none());

        let parser = parser.with_first_row_header(false).with_sheet("Triples");
        assert!(!parser.first_row_header);
        assert_eq!(parser.sheet.as_deref(), Some("Triples"));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(ExcelParser::cell_to_string(&Data::Empty), "");
        assert_eq!(
            ExcelParser::cell_to_string(&Data::String("test".to_string())),
            "test"
        );
        assert_eq!(ExcelParser::cell_to_string(&Data::Int(42)), "42");
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(3.5)), "3.5");
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(1905.0)), "1905");
        assert_eq!(ExcelParser::cell_to_string(&Data::Bool(true)), "TRUE");
    }

    #[test]
    fn test_process_sheet_skips_blank_rows() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("subject".to_string()));
        range.set_value((0, 1), Data::String("relation".to_string()));
        range.set_value((0, 2), Data::String("object".to_string()));
        range.set_value((2, 0), Data::String("Ada Lovelace".to_string()));
        range.set_value((2, 1), Data::String("wrote".to_string()));
        range.set_value((2, 2), Data::String("Notes".to_string()));

        let table = ExcelParser::new().process_sheet("Sheet1", range);

        assert_eq!(table.caption.as_deref(), Some("Sheet1"));
        assert_eq!(table.headers, vec!["subject", "relation", "object"]);
        assert_eq!(table.rows, vec![vec!["Ada Lovelace", "wrote", "Notes"]]);
    }

    #[test]
    fn test_supported_types() {
        let parser = ExcelParser::new();
        assert!(parser.can_parse(FileType::Xlsx));
        assert!(parser.can_parse(FileType::Xls));
        assert!(!parser.can_parse(FileType::Csv));
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = ExcelParser::new().parse(&path).unwrap_err();
        assert!(matches!(err, ParserError::ExcelError(_)));
    }
}
