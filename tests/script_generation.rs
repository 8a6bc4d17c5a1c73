//! End-to-end script generation from dataset files

use std::fs;

use entity_sql::context::{GenerationConfig, GenerationContext};
use entity_sql::dataset::{Dataset, DatasetPlan};
use entity_sql::dialect::DialectKind;
use entity_sql::error::GeneratorError;
use entity_sql::writer::ScriptWriter;

const SHELVES: &str = r#"
entities:
  - name: Shelf
    id: { generator: { strategy: table } }
  - name: Book
    id: { generator: { strategy: sequence, name: book_seq } }
rows:
  - { entity: Shelf, key: a, values: { label: A } }
  - { entity: Shelf, key: b, values: { label: B } }
  - { entity: Book, key: dune, values: { title: Dune }, links: { shelf_id: a } }
"#;

const SHELF_ROW: &str = "(SELECT last_value FROM id_counters WHERE counter_name = 'shelf')";

fn generate(dataset: &Dataset, config: GenerationConfig) -> Result<Vec<String>, GeneratorError> {
    let mut context = GenerationContext::new(config);
    let mut plan = DatasetPlan::prepare(dataset, &mut context)?;
    let mut writer = ScriptWriter::new(Vec::new(), &context);
    plan.write_rows(&mut writer)?;
    let output = writer.close(&context)?;
    Ok(String::from_utf8(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect())
}

#[test]
fn test_relative_script_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelves.yaml");
    fs::write(&path, SHELVES).unwrap();

    let dataset = Dataset::load_from_file(&path).unwrap();
    let lines = generate(&dataset, GenerationConfig::default()).unwrap();

    assert_eq!(
        lines,
        vec![
            "/* Shelf */".to_string(),
            "UPDATE id_counters SET last_value = last_value + 50 WHERE counter_name = 'shelf';"
                .to_string(),
            format!("INSERT INTO shelf (id, label) VALUES (({} - 49), 'A');", SHELF_ROW),
            format!("INSERT INTO shelf (id, label) VALUES (({} - 48), 'B');", SHELF_ROW),
            String::new(),
            "/* Book */".to_string(),
            format!(
                "INSERT INTO book (id, title, shelf_id) VALUES (nextval('book_seq'), 'Dune', ({} - 49));",
                SHELF_ROW
            ),
            "UPDATE id_counters SET last_value = last_value - 48 WHERE counter_name = 'shelf';"
                .to_string(),
        ]
    );
}

#[test]
fn test_absolute_script_aligns_counters() {
    let dataset = Dataset::from_yaml(SHELVES).unwrap();
    let config = GenerationConfig {
        write_relative_ids: false,
        ..GenerationConfig::default()
    };
    let lines = generate(&dataset, config).unwrap();

    assert_eq!(
        lines,
        vec![
            "/* Shelf */",
            "INSERT INTO shelf (id, label) VALUES (1, 'A');",
            "INSERT INTO shelf (id, label) VALUES (2, 'B');",
            "",
            "/* Book */",
            "INSERT INTO book (id, title, shelf_id) VALUES (1, 'Dune', 1);",
            "UPDATE id_counters SET last_value = last_value + 2 WHERE counter_name = 'shelf';",
            "ALTER SEQUENCE book_seq RESTART WITH 2;",
        ]
    );
}

#[test]
fn test_mysql_identity_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authors.json");
    fs::write(
        &path,
        r#"{
            "entities": [{ "name": "Author", "natural_key": ["name"] }, { "name": "Book" }],
            "rows": [
                { "entity": "Author", "key": "existing", "reference": "unknown", "values": { "name": "O'Brien" } },
                { "entity": "Author", "key": "new" },
                { "entity": "Book", "key": "b1", "links": { "author_id": "new", "coauthor_id": "existing" } }
            ]
        }"#,
    )
    .unwrap();

    let dataset = Dataset::load_from_file(&path).unwrap();
    let config = GenerationConfig {
        dialect: DialectKind::Mysql,
        ..GenerationConfig::default()
    };
    let lines = generate(&dataset, config).unwrap();

    assert_eq!(
        lines,
        vec![
            "/* Author */",
            "INSERT INTO author () VALUES ();",
            "",
            "/* Book */",
            "INSERT INTO book (author_id, coauthor_id) VALUES ((SELECT MAX(id) FROM author), \
             (SELECT id FROM author WHERE name = 'O''Brien'));",
        ]
    );
}

#[test]
fn test_sequences_rejected_for_mysql() {
    let dataset = Dataset::from_yaml(SHELVES).unwrap();
    let config = GenerationConfig {
        dialect: DialectKind::Mysql,
        ..GenerationConfig::default()
    };
    let result = generate(&dataset, config);
    assert!(matches!(result, Err(GeneratorError::Configuration(_))));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Dataset::load_from_file(dir.path().join("missing.yaml"));
    assert!(matches!(result, Err(GeneratorError::Dataset(_))));
}
