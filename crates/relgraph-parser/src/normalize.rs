//! Triple normalization
//!
//! Maps heterogeneous tabular rows onto canonical `Triple`s. Columns are
//! found by trimmed, case-insensitive header name; the `entity_1` /
//! `entity_2` family is accepted as aliases for subject and object.

use std::collections::HashSet;

use relgraph_core::{RelgraphError, Result, Triple};

use crate::Table;

/// Semantic column with its accepted header names
struct Column {
    name: &'static str,
    aliases: &'static [&'static str],
}

const SUBJECT: Column = Column {
    name: "subject",
    aliases: &["entity_1"],
};
const RELATION: Column = Column {
    name: "relation",
    aliases: &[],
};
const OBJECT: Column = Column {
    name: "object",
    aliases: &["entity_2"],
};
const SUBJECT_TYPE: Column = Column {
    name: "subject_type",
    aliases: &["entity_1_type"],
};
const OBJECT_TYPE: Column = Column {
    name: "object_type",
    aliases: &["entity_2_type"],
};
const DOMAIN: Column = Column {
    name: "domain",
    aliases: &[],
};
const COUNTRY: Column = Column {
    name: "country",
    aliases: &[],
};
const START_YEAR: Column = Column {
    name: "start_year",
    aliases: &[],
};
const END_YEAR: Column = Column {
    name: "end_year",
    aliases: &[],
};
const NOTES: Column = Column {
    name: "notes",
    aliases: &[],
};

impl Column {
    fn locate(&self, table: &Table) -> Option<usize> {
        table
            .column_index(self.name)
            .or_else(|| self.aliases.iter().find_map(|a| table.column_index(a)))
    }
}

/// Resolved column positions
struct Layout {
    subject: usize,
    relation: usize,
    object: usize,
    subject_type: Option<usize>,
    object_type: Option<usize>,
    domain: Option<usize>,
    country: Option<usize>,
    start_year: Option<usize>,
    end_year: Option<usize>,
    notes: Option<usize>,
}

impl Layout {
    fn resolve(table: &Table) -> Result<Self> {
        let subject = SUBJECT.locate(table);
        let relation = RELATION.locate(table);
        let object = OBJECT.locate(table);

        let (Some(subject), Some(relation), Some(object)) = (subject, relation, object) else {
            let missing: Vec<&str> = [(&SUBJECT, subject), (&RELATION, relation), (&OBJECT, object)]
                .into_iter()
                .filter(|(_, found)| found.is_none())
                .map(|(column, _)| column.name)
                .collect();
            return Err(RelgraphError::Validation(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        };

        Ok(Self {
            subject,
            relation,
            object,
            subject_type: SUBJECT_TYPE.locate(table),
            object_type: OBJECT_TYPE.locate(table),
            domain: DOMAIN.locate(table),
            country: COUNTRY.locate(table),
            start_year: START_YEAR.locate(table),
            end_year: END_YEAR.locate(table),
            notes: NOTES.locate(table),
        })
    }
}

fn optional(table: &Table, row: usize, column: Option<usize>) -> Option<String> {
    let value = table.cell(row, column?).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse a year cell; workbooks and dataframe exports write "1905.0"
fn parse_year(value: &str) -> Option<i32> {
    if let Ok(year) = value.parse::<i32>() {
        return Some(year);
    }
    let float = value.parse::<f64>().ok()?;
    if float.fract() == 0.0 && float >= i32::MIN as f64 && float <= i32::MAX as f64 {
        Some(float as i32)
    } else {
        None
    }
}

fn year(table: &Table, row: usize, column: Option<usize>, name: &str) -> Option<i32> {
    let value = optional(table, row, column)?;
    let year = parse_year(&value);
    if year.is_none() {
        tracing::warn!(row = row + 1, column = name, value = %value, "ignoring unparseable year");
    }
    year
}

/// Convert a table into canonical triples
///
/// Fails with a validation error naming every missing required column.
/// Rows with an empty subject, relation or object are dropped, as are
/// exact duplicates after the first; order is otherwise preserved.
pub fn normalize(table: &Table) -> Result<Vec<Triple>> {
    let layout = Layout::resolve(table)?;

    let mut seen = HashSet::new();
    let mut triples = Vec::with_capacity(table.num_rows());
    let mut incomplete = 0;
    let mut duplicates = 0;

    for row in 0..table.num_rows() {
        let subject = table.cell(row, layout.subject).trim();
        let relation = table.cell(row, layout.relation).trim();
        let object = table.cell(row, layout.object).trim();
        if subject.is_empty() || relation.is_empty() || object.is_empty() {
            incomplete += 1;
            continue;
        }

        let triple = Triple::new(subject, relation, object)
            .with_types(
                optional(table, row, layout.subject_type),
                optional(table, row, layout.object_type),
            )
            .with_years(
                year(table, row, layout.start_year, START_YEAR.name),
                year(table, row, layout.end_year, END_YEAR.name),
            );
        let triple = Triple {
            domain: optional(table, row, layout.domain),
            country: optional(table, row, layout.country),
            notes: optional(table, row, layout.notes),
            ..triple
        };

        if seen.insert(triple.clone()) {
            triples.push(triple);
        } else {
            duplicates += 1;
        }
    }

    if incomplete > 0 {
        tracing::warn!(rows = incomplete, "dropped rows missing subject, relation or object");
    }
    tracing::info!(
        rows = table.num_rows(),
        triples = triples.len(),
        duplicates,
        "normalized table"
    );
    Ok(triples)
}

// ============================================================================
// Tests
// ============================================================================
