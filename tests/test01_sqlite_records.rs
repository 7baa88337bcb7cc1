#![cfg(feature = "sqlite")]
///! Record access against an in-memory `SQLite` database: strict and lenient single
///! row lookups, keyed result sets, counts, updates and the two flavours of delete.
mod common;

use common::sqlite_widgets;
use dml_middleware::prelude::*;
use serde::Deserialize;

fn add(db: &mut Database, name: &str, visible: bool) -> Result<i64, DmlError> {
    let id = db.insert_record(
        "widgets",
        &FieldMap::new().with("name", name).with("visible", visible),
        true,
    )?;
    Ok(id.expect("sqlite returns generated ids"))
}

#[test]
fn strict_lookup_follows_row_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    let bolt = FieldMap::new().with("name", "Bolt");

    let err = db.record("widgets", &bolt, "*", Strictness::MustExist).unwrap_err();
    assert!(matches!(err, DmlError::MissingRecord { .. }));
    assert!(err.is_lookup_error());
    assert!(db.record("widgets", &bolt, "*", Strictness::IgnoreMissing)?.is_none());

    let id = add(&mut db, "Bolt", true)?;
    let found = db
        .record("widgets", &bolt, "*", Strictness::MustExist)?
        .expect("one row");
    assert_eq!(found.id(), Some(id));
    assert_eq!(found.get("visible"), Some(&RowValues::Int(1)));

    add(&mut db, "Bolt", false)?;
    let err = db.record("widgets", &bolt, "*", Strictness::MustExist).unwrap_err();
    assert!(matches!(err, DmlError::MultipleRecords { .. }));

    let lenient = db.record("widgets", &bolt, "id, name", Strictness::IgnoreMissing)?;
    assert_eq!(lenient.and_then(|r| r.get("name").cloned()), Some("Bolt".into()));
    let first = db.record_sql(
        "SELECT * FROM {widgets} WHERE name = ? ORDER BY id",
        vec![RowValues::from("Bolt")],
        Strictness::IgnoreMultiple,
    )?;
    assert_eq!(first.and_then(|r| r.id()), Some(id));
    Ok(())
}

#[test]
fn lookup_reports_multiple() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    assert!(matches!(
        db.lookup_record_sql("SELECT * FROM {widgets}", Params::none())?,
        RecordLookup::NotFound
    ));
    add(&mut db, "a", true)?;
    add(&mut db, "b", true)?;
    let lookup = db.lookup_record_sql("SELECT * FROM {widgets} ORDER BY id", Params::none())?;
    assert!(matches!(lookup, RecordLookup::Multiple(_)));
    assert_eq!(
        lookup.into_record().and_then(|r| r.get("name").cloned()),
        Some("a".into())
    );
    Ok(())
}

#[test]
fn delete_by_conditions_or_whole_table() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    for name in ["a", "b", "c"] {
        add(&mut db, name, true)?;
    }

    let removed = db.delete_records("widgets", Some(&FieldMap::new().with("name", "b")))?;
    assert_eq!(removed, DeleteOutcome::Deleted(1));

    assert_eq!(db.delete_records("widgets", None)?, DeleteOutcome::Truncated);
    assert_eq!(db.count_records("widgets", &FieldMap::new())?, 0);
    Ok(())
}

#[test]
fn empty_conditions_delete_what_they_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    add(&mut db, "a", true)?;
    add(&mut db, "b", false)?;

    let everything = FieldMap::new();
    assert_eq!(db.count_records("widgets", &everything)?, 2);
    assert!(db.record_exists("widgets", &everything)?);

    assert_eq!(
        db.delete_records("widgets", Some(&everything))?,
        DeleteOutcome::Deleted(2)
    );
    assert_eq!(db.count_records("widgets", &everything)?, 0);
    assert!(!db.record_exists("widgets", &everything)?);
    Ok(())
}

#[test]
fn delete_by_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    let a = add(&mut db, "a", true)?;
    let b = add(&mut db, "b", true)?;
    add(&mut db, "c", true)?;

    assert_eq!(db.delete_records_list("widgets", "id", &[])?, 0);
    assert_eq!(db.delete_records_list("widgets", "id", &[a.into(), b.into()])?, 2);
    assert_eq!(db.count_records("widgets", &FieldMap::new())?, 1);
    Ok(())
}

#[test]
fn keyed_records_and_menus() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    let nut = add(&mut db, "Nut", true)?;
    let bolt = add(&mut db, "Bolt", true)?;
    add(&mut db, "Hidden", false)?;

    let visible = FieldMap::new().with("visible", true);
    let records = db.records("widgets", &visible, &Selection::new().sort("name"))?;
    assert_eq!(records.len(), 2);
    assert_eq!(records.keys(), vec![bolt.to_string(), nut.to_string()]);
    assert_eq!(
        records.get(nut).and_then(|r| r.get("name").cloned()),
        Some("Nut".into())
    );

    let menu = db.records_menu(
        "widgets",
        &visible,
        &Selection::new().fields("id, name").sort("id"),
    )?;
    assert_eq!(
        menu,
        vec![
            (nut.to_string(), RowValues::from("Nut")),
            (bolt.to_string(), RowValues::from("Bolt")),
        ]
    );
    let err = db
        .records_menu("widgets", &visible, &Selection::new().fields("id"))
        .unwrap_err();
    assert!(matches!(err, DmlError::InvalidUsage(_)));

    let page = db.records("widgets", &FieldMap::new(), &Selection::new().sort("id").page(1, 1))?;
    assert_eq!(page.keys(), vec![bolt.to_string()]);

    let listed = db.records_list("widgets", "name", &["Nut".into(), "Hidden".into()], &Selection::new())?;
    assert_eq!(listed.len(), 2);
    assert!(db.records_list("widgets", "name", &[], &Selection::new())?.is_empty());
    Ok(())
}

#[test]
fn fields_counts_and_existence() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    assert_eq!(db.count_records("widgets", &FieldMap::new())?, 0);
    assert!(!db.record_exists("widgets", &FieldMap::new())?);

    let id = add(&mut db, "Bolt", true)?;
    add(&mut db, "Nut", false)?;

    assert!(db.record_exists("widgets", &FieldMap::new().with("name", "Nut"))?);
    assert_eq!(
        db.count_records_select("widgets", "visible = ?", vec![RowValues::Int(0)], "COUNT(1)")?,
        1
    );
    assert_eq!(
        db.field("widgets", "name", &FieldMap::new().with("id", id), Strictness::MustExist)?,
        Some("Bolt".into())
    );
    let names = db.fieldset_sql("SELECT name FROM {widgets} ORDER BY name DESC", Params::none())?;
    assert_eq!(names, vec![RowValues::from("Nut"), RowValues::from("Bolt")]);
    let err = db
        .count_records_sql("SELECT name FROM {widgets} WHERE id = ?", vec![RowValues::Int(id)])
        .unwrap_err();
    assert!(matches!(err, DmlError::InvalidUsage(_)));
    Ok(())
}

#[test]
fn updates_and_set_field() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    let id = add(&mut db, "Bolt", true)?;
    add(&mut db, "Nut", true)?;

    db.update_record(
        "widgets",
        &FieldMap::new()
            .with("id", id)
            .with("name", "Big bolt")
            .with("colour", "red"),
    )?;
    assert_eq!(
        db.field("widgets", "name", &FieldMap::new().with("id", id), Strictness::MustExist)?,
        Some("Big bolt".into())
    );

    let err = db
        .update_record("widgets", &FieldMap::new().with("name", "x"))
        .unwrap_err();
    assert!(matches!(err, DmlError::InvalidUsage(_)));

    let changed = db.set_field("widgets", "visible", 0, &FieldMap::new())?;
    assert_eq!(changed, 2);
    db.set_field(
        "widgets",
        "name",
        RowValues::Null,
        &FieldMap::new().with("id", id),
    )?;
    assert_eq!(
        db.field("widgets", "name", &FieldMap::new().with("id", id), Strictness::MustExist)?,
        Some(RowValues::Null)
    );
    let renamed = db.set_field_select(
        "widgets",
        "name",
        "Washer",
        "name = :old",
        Params::named([("old", "Nut")]),
    )?;
    assert_eq!(renamed, 1);
    assert!(db.record_exists("widgets", &FieldMap::new().with("name", "Washer"))?);
    Ok(())
}

#[test]
fn inserts_clean_their_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;

    let id = db
        .insert_record(
            "widgets",
            &FieldMap::new()
                .with("id", 999)
                .with("name", "Bolt")
                .with("visible", "")
                .with("unknown", 1),
            true,
        )?
        .expect("generated id");
    assert_ne!(id, 999);
    let row = db
        .record("widgets", &FieldMap::new().with("id", id), "*", Strictness::MustExist)?
        .expect("row");
    assert_eq!(row.get("visible"), Some(&RowValues::Int(0)));

    db.import_record(
        "widgets",
        &FieldMap::new().with("id", 500).with("name", "Restored").with("visible", 1),
    )?;
    assert!(db.record_exists("widgets", &FieldMap::new().with("id", 500))?);

    let batch = [
        FieldMap::new().with("name", "x").with("visible", 1),
        FieldMap::new().with("name", "y").with("visible", 0),
    ];
    db.insert_records("widgets", &batch)?;
    assert_eq!(db.count_records("widgets", &FieldMap::new())?, 4);

    let mismatched = [
        FieldMap::new().with("name", "x"),
        FieldMap::new().with("visible", 0),
    ];
    assert!(matches!(
        db.insert_records("widgets", &mismatched),
        Err(DmlError::InvalidUsage(_))
    ));
    assert!(matches!(
        db.insert_record("gadgets", &FieldMap::new().with("name", "x"), false),
        Err(DmlError::InvalidUsage(_))
    ));
    Ok(())
}

#[derive(Debug, Deserialize, PartialEq)]
struct Widget {
    id: i64,
    name: String,
    visible: i64,
}

#[test]
fn records_hydrate_into_structs() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    let id = add(&mut db, "Bolt", true)?;
    let widget: Widget = db
        .record("widgets", &FieldMap::new().with("id", id), "*", Strictness::MustExist)?
        .expect("row")
        .hydrate()?;
    assert_eq!(
        widget,
        Widget {
            id,
            name: "Bolt".into(),
            visible: 1
        }
    );
    Ok(())
}

#[test]
fn placeholder_styles_all_reach_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    add(&mut db, "Bolt", true)?;
    add(&mut db, "Nut", false)?;

    let named = db.records_sql(
        "SELECT * FROM {widgets} WHERE name = :name AND visible = :visible",
        Params::named([("name", RowValues::from("Bolt")), ("visible", RowValues::Int(1))]),
        0,
        0,
    )?;
    assert_eq!(named.len(), 1);

    let ordinal = db.records_sql(
        "SELECT * FROM {widgets} WHERE visible = $2 OR name = $1",
        vec![RowValues::from("Nut"), RowValues::Int(1)],
        0,
        0,
    )?;
    assert_eq!(ordinal.len(), 2);

    let err = db
        .records_sql("SELECT * FROM {widgets} WHERE name = ?", Params::none(), 0, 0)
        .unwrap_err();
    assert!(matches!(err, DmlError::ParameterError(_)));
    Ok(())
}

#[test]
fn recordsets_iterate_and_close() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    for name in ["a", "b", "c"] {
        add(&mut db, name, true)?;
    }
    let mut rs = db.recordset("widgets", &FieldMap::new(), &Selection::new().sort("name"))?;
    assert!(rs.valid());
    assert_eq!(rs.current().and_then(|r| r.get("name").cloned()), Some("a".into()));
    rs.advance()?;
    assert_eq!(rs.current().and_then(|r| r.get("name").cloned()), Some("b".into()));
    rs.close();
    assert!(rs.is_closed());
    assert!(!rs.valid());

    let names: Vec<RowValues> = db
        .recordset_sql("SELECT name FROM {widgets} ORDER BY name", Params::none(), 1, 0)?
        .map(|r| r.map(|r| r.first_value().cloned().unwrap_or(RowValues::Null)))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec![RowValues::from("b"), RowValues::from("c")]);
    Ok(())
}

#[test]
fn metadata_is_cached_until_a_schema_change() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = sqlite_widgets(DbOptions::default())?;
    assert_eq!(db.get_tables()?, vec!["widgets".to_string()]);

    let before = db.get_columns("widgets")?;
    assert_eq!(before.len(), 3);
    let reads = db.perf_reads();
    db.get_columns("widgets")?;
    assert_eq!(db.perf_reads(), reads);

    db.execute("ALTER TABLE {widgets} ADD COLUMN colour TEXT", Params::none())?;
    let after = db.get_columns("widgets")?;
    assert!(after.iter().any(|c| c.name == "colour"));

    let err = db
        .execute("DELETE FROM {widgets}; DROP TABLE {widgets}", Params::none())
        .unwrap_err();
    assert!(matches!(err, DmlError::InvalidUsage(_)));
    Ok(())
}

#[test]
fn file_database_survives_reconnect() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("widgets.db");
    let config = ConnectionConfig::builder(DatabaseType::Sqlite)
        .dbname(path.to_string_lossy())
        .prefix("mdl_")
        .finish();

    let mut db = Database::connect(config.clone())?;
    db.execute(common::WIDGETS_DDL, Params::none())?;
    add(&mut db, "Bolt", true)?;
    db.dispose();
    assert!(db.is_disposed());

    let mut reopened = Database::connect(config)?;
    assert_eq!(reopened.count_records("widgets", &FieldMap::new())?, 1);
    assert_eq!(reopened.export_config().prefix, "mdl_");
    Ok(())
}
