///! Schema changes through the DDL generator and their effect on the metadata caches.
mod common;

use common::scripted;
use dml_middleware::prelude::*;
use dml_middleware::structure::SqlGenerator;

fn gadgets() -> TableSpec {
    TableSpec::new("gadgets")
        .field(FieldSpec::new("name", FieldKind::Char(100)).not_null())
        .field(FieldSpec::new("weight", FieldKind::Number { precision: 10, scale: 2 }))
        .field(FieldSpec::new("active", FieldKind::Integer).default_value(1))
}

struct AuditedGenerator;

impl SqlGenerator for AuditedGenerator {
    fn family(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn name(&self) -> String {
        "audited_sql_generator".to_string()
    }

    fn create_table_sql(&self, table: &TableSpec) -> Vec<String> {
        vec![
            format!("CREATE TABLE {{{}}} (id BIGSERIAL PRIMARY KEY)", table.name),
            format!("COMMENT ON TABLE {{{}}} IS 'audited'", table.name),
        ]
    }
}

#[test]
fn custom_generator_statements_run_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, script) = scripted(DatabaseType::Postgres, ParamStyles::ORDINAL, "p_");
    db.set_sql_generator(Box::new(AuditedGenerator));
    db.create_table(&gadgets())?;
    db.drop_table("gadgets")?;
    assert_eq!(
        script.lock().unwrap().sql(),
        vec![
            "CREATE TABLE p_gadgets (id BIGSERIAL PRIMARY KEY)",
            "COMMENT ON TABLE p_gadgets IS 'audited'",
            "DROP TABLE p_gadgets",
        ]
    );
    assert_eq!(db.perf_writes(), 3);

    script.lock().unwrap().fail_next = Some("permission denied".into());
    match db.create_table(&gadgets()).unwrap_err() {
        DmlError::StructureError { generator, .. } => assert_eq!(generator, "audited_sql_generator"),
        other => panic!("expected a structure error, got {other:?}"),
    }
    // The failed first statement stops the batch.
    assert_eq!(script.lock().unwrap().statements.len(), 4);
    Ok(())
}

#[cfg(feature = "sqlite")]
#[test]
fn create_and_drop_on_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = common::sqlite_widgets(DbOptions::default())?;
    assert_eq!(db.get_tables()?, vec!["widgets".to_string()]);

    db.create_table(&gadgets())?;
    let mut tables = db.get_tables()?;
    tables.sort();
    assert_eq!(tables, vec!["gadgets".to_string(), "widgets".to_string()]);

    let columns = db.get_columns("gadgets")?;
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "weight", "active"]);
    let id = &columns[0];
    assert!(id.primary_key);
    let name = &columns[1];
    assert!(name.not_null);
    assert_eq!(name.max_length, Some(100));
    let active = &columns[3];
    assert!(active.has_default);
    assert_eq!(active.default_value, Some(RowValues::Int(1)));

    let new_id = db
        .insert_record("gadgets", &FieldMap::new().with("name", "Sprocket"), true)?
        .expect("generated id");
    assert_eq!(
        db.field("gadgets", "active", &FieldMap::new().with("id", new_id), Strictness::MustExist)?,
        Some(RowValues::Int(1))
    );

    db.drop_table("gadgets")?;
    assert_eq!(db.get_tables()?, vec!["widgets".to_string()]);
    assert!(db.get_columns("gadgets")?.is_empty());
    Ok(())
}

#[cfg(feature = "sqlite")]
#[test]
fn failed_ddl_names_the_generator() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = common::sqlite_widgets(DbOptions::default())?;
    let err = db
        .create_table(&TableSpec::new("widgets").field(FieldSpec::new("x", FieldKind::Text)))
        .unwrap_err();
    match err {
        DmlError::StructureError {
            message,
            sql,
            generator,
        } => {
            assert_eq!(generator, "sqlite_sql_generator");
            assert!(sql.starts_with("CREATE TABLE mdl_widgets"), "{sql}");
            assert!(message.contains("already exists"), "{message}");
        }
        other => panic!("expected a structure error, got {other:?}"),
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
#[test]
fn indexes_are_listed() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = common::sqlite_widgets(DbOptions::default())?;
    db.change_database_structure(&[
        "CREATE UNIQUE INDEX {widgets_name_uix} ON {widgets} (name)".to_string(),
        "CREATE INDEX {widgets_vis_ix} ON {widgets} (visible, name)".to_string(),
    ])?;
    let mut indexes = db.get_indexes("widgets")?;
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0].name, "mdl_widgets_name_uix");
    assert!(indexes[0].unique);
    assert_eq!(indexes[1].columns, vec!["visible".to_string(), "name".to_string()]);
    assert!(!indexes[1].unique);
    Ok(())
}
