//! File-to-triples tests

use std::io::Write;

use relgraph_core::Triple;
use relgraph_parser::{normalize, parse_path, CsvParser};

const DATASET: &str = "\
entity_1,relation,entity_2,domain,country,start_year,end_year,entity_1_type,entity_2_type,notes
Albert Einstein,developed,Theory of Relativity,physics,Germany,1905.0,1915.0,person,theory,
Albert Einstein,developed,Theory of Relativity,physics,Germany,1905.0,1915.0,person,theory,
,won_award,Nobel Prize,physics,,,,,,
Marie Curie,won_award,Nobel Prize,chemistry,France,1911,,person,award,second Nobel
";

#[test]
fn test_csv_file_normalizes_to_unique_triples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.csv");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(DATASET.as_bytes())
        .unwrap();

    let table = parse_path(&path, None).unwrap();
    let triples = normalize(&table).unwrap();

    assert_eq!(triples.len(), 2);
    assert_eq!(
        triples[0],
        Triple::new("Albert Einstein", "developed", "Theory of Relativity")
            .with_types(Some("person".to_string()), Some("theory".to_string()))
            .with_domain("physics")
            .with_country("Germany")
            .with_years(Some(1905), Some(1915))
    );
    assert_eq!(triples[1].subject, "Marie Curie");
    assert_eq!(triples[1].end_year, None);
    assert_eq!(triples[1].notes.as_deref(), Some("second Nobel"));
}

#[test]
fn test_tsv_dispatch_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.tsv");
    std::fs::write(&path, "Subject\tRelation\tObject\nAda Lovelace\twrote\tNotes, on the engine\n")
        .unwrap();

    let triples = normalize(&parse_path(&path, None).unwrap()).unwrap();
    assert_eq!(
        triples,
        vec![Triple::new("Ada Lovelace", "wrote", "Notes, on the engine")]
    );
}

#[test]
fn test_uploaded_bytes_missing_columns() {
    let table = CsvParser::new()
        .from_bytes(b"name,description\nA,B\n")
        .unwrap();

    let report = normalize(&table).unwrap_err().to_report();
    assert_eq!(report.code, "validation_error");
    assert!(report.message.contains("subject, relation, object"));
}

#[test]
fn test_triples_serialize_as_field_maps() {
    let table = CsvParser::new()
        .from_bytes(b"subject,relation,object,start_year\nA,r,B,2001\n")
        .unwrap();
    let triples = normalize(&table).unwrap();

    let json = serde_json::to_value(&triples).unwrap();
    assert_eq!(json[0]["subject"], "A");
    assert_eq!(json[0]["start_year"], 2001);
    assert!(json[0]["country"].is_null());
}
