///! WHERE fragments from condition maps, value lists and the IN / = builder, checked
///! both as rendered SQL and against real rows.
mod common;

use std::collections::BTreeMap;

use common::scripted;
use dml_middleware::prelude::*;

fn merge(fragments: &[&InOrEqual]) -> Params {
    let mut merged = BTreeMap::new();
    for fragment in fragments {
        if let Params::Named(map) = &fragment.params {
            merged.extend(map.clone());
        }
    }
    Params::Named(merged)
}

#[test]
fn condition_maps_render_for_an_ordinal_driver() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, script) = scripted(DatabaseType::Postgres, ParamStyles::ORDINAL, "p_");
    db.records(
        "widgets",
        &FieldMap::new()
            .with("name", "Bolt")
            .with("deleted", RowValues::Null)
            .with("visible", true),
        &Selection::new().sort("name"),
    )?;

    let script = script.lock().unwrap();
    let query = script.statements.last().expect("one statement");
    assert_eq!(
        query.sql,
        "SELECT * FROM p_widgets WHERE name = $1 AND deleted IS NULL AND visible = $2 ORDER BY name"
    );
    assert_eq!(query.values(), vec![RowValues::from("Bolt"), RowValues::Int(1)]);
    Ok(())
}

#[test]
fn value_lists_render_for_a_named_driver() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, script) = scripted(DatabaseType::Mssql, ParamStyles::NAMED, "");
    db.records_list(
        "widgets",
        "name",
        &[RowValues::from("a"), RowValues::Null, RowValues::from("b")],
        &Selection::new(),
    )?;
    db.records_list("widgets", "name", &[], &Selection::new())?;

    let script = script.lock().unwrap();
    let sql = script.sql();
    assert_eq!(
        sql[0],
        "SELECT * FROM widgets WHERE (name IS NULL OR name IN (:param1,:param2))"
    );
    assert_eq!(sql[1], "SELECT * FROM widgets WHERE 1 = 2");
    assert_eq!(
        script.statements[0].params,
        Params::named([("param1", "a"), ("param2", "b")])
    );
    Ok(())
}

#[test]
fn mssql_paging_always_has_an_order() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, script) = scripted(DatabaseType::Mssql, ParamStyles::NAMED, "");
    script
        .lock()
        .unwrap()
        .responses
        .push_back(vec![vec![RowValues::Int(1), RowValues::from("Bolt")]]);

    let bolt = db.record(
        "widgets",
        &FieldMap::new().with("name", "Bolt"),
        "*",
        Strictness::MustExist,
    )?;
    assert!(bolt.is_some());
    db.records(
        "widgets",
        &FieldMap::new(),
        &Selection::new().sort("name DESC").page(10, 5),
    )?;
    db.records("widgets", &FieldMap::new(), &Selection::new())?;

    let script = script.lock().unwrap();
    let sql = script.sql();
    assert_eq!(
        sql[0],
        "SELECT * FROM widgets WHERE name = :param1 ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 2 ROWS ONLY"
    );
    assert_eq!(
        sql[1],
        "SELECT * FROM widgets ORDER BY name DESC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(sql[2], "SELECT * FROM widgets");
    Ok(())
}

#[test]
fn paging_drops_trailing_semicolons() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, script) = scripted(DatabaseType::Postgres, ParamStyles::ORDINAL, "p_");
    db.record_sql(
        "SELECT id FROM {widgets} WHERE name = ?; ",
        vec![RowValues::from("Bolt")],
        Strictness::IgnoreMultiple,
    )?;

    let script = script.lock().unwrap();
    assert_eq!(
        script.sql().last().map(String::as_str),
        Some("SELECT id FROM p_widgets WHERE name = $1 LIMIT 1")
    );
    Ok(())
}

#[test]
fn numeric_condition_keys_are_refused() {
    let (mut db, script) = scripted(DatabaseType::Sqlite, ParamStyles::POSITIONAL, "");
    let err = db
        .records("widgets", &FieldMap::new().with("0", 5), &Selection::new())
        .unwrap_err();
    assert!(matches!(err, DmlError::InvalidUsage(_)));
    assert!(matches!(
        db.delete_records("widgets", Some(&FieldMap::new().with("12", 1))),
        Err(DmlError::InvalidUsage(_))
    ));
    assert!(script.lock().unwrap().statements.is_empty());
}

#[test]
fn named_fragments_never_collide_on_one_connection() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, _script) = scripted(DatabaseType::Postgres, ParamStyles::ORDINAL, "");

    let first = db.get_in_or_equal(InOrEqualBuilder::new(["a", "b"]).named("name"))?;
    let second = db.get_in_or_equal(InOrEqualBuilder::new([4]).named("cat").negated())?;
    assert_eq!(first.sql, "IN (:name1,:name2)");
    assert_eq!(second.sql, "<> :cat3");

    let rejected = db.get_in_or_equal(InOrEqualBuilder::new(Vec::<RowValues>::new()).named("x"));
    assert!(matches!(rejected, Err(DmlError::InvalidUsage(_))));
    let third = db.get_in_or_equal(InOrEqualBuilder::new([1, 2]).named("id"))?;
    assert_eq!(third.sql, "IN (:id4,:id5)");

    let bad_prefix = db.get_in_or_equal(InOrEqualBuilder::new([1]).named("Bad-Prefix"));
    assert!(matches!(bad_prefix, Err(DmlError::ParameterError(_))));
    Ok(())
}

#[test]
fn empty_policies() -> Result<(), Box<dyn std::error::Error>> {
    let (mut db, _script) = scripted(DatabaseType::Sqlite, ParamStyles::POSITIONAL, "");
    let none: Vec<RowValues> = Vec::new();

    let fragment = db.get_in_or_equal(InOrEqualBuilder::new(none.clone()).on_empty(OnEmpty::IsNull))?;
    assert_eq!(fragment.sql, "IS NULL");
    assert!(fragment.params.is_empty());

    let fragment = db.get_in_or_equal(
        InOrEqualBuilder::new(none.clone())
            .negated()
            .on_empty(OnEmpty::IsNull),
    )?;
    assert_eq!(fragment.sql, "IS NOT NULL");

    let fragment = db.get_in_or_equal(
        InOrEqualBuilder::new(none).on_empty(OnEmpty::Value(RowValues::Int(0))),
    )?;
    assert_eq!(fragment.sql, "= ?");
    assert_eq!(fragment.params, Params::Positional(vec![RowValues::Int(0)]));
    Ok(())
}

#[cfg(feature = "sqlite")]
mod against_sqlite {
    use super::*;

    fn seeded() -> Result<Database, DmlError> {
        let mut db = common::sqlite_widgets(DbOptions::default())?;
        for (name, visible) in [("Bolt", 1), ("Nut", 0), ("Washer", 1)] {
            db.insert_record(
                "widgets",
                &FieldMap::new().with("name", name).with("visible", visible),
                false,
            )?;
        }
        db.insert_record("widgets", &FieldMap::new().with("visible", 0), false)?;
        Ok(db)
    }

    fn matching(db: &mut Database, select: &str, params: Params) -> Result<usize, DmlError> {
        Ok(db
            .records_select("widgets", select, params, &Selection::new())?
            .len())
    }

    #[test]
    fn empty_sentinel_matches_nothing_either_way() -> Result<(), Box<dyn std::error::Error>> {
        let mut db = seeded()?;
        for builder in [
            InOrEqualBuilder::new(Vec::<RowValues>::new()).on_empty(OnEmpty::MatchNone),
            InOrEqualBuilder::new(Vec::<RowValues>::new())
                .negated()
                .on_empty(OnEmpty::MatchNone),
        ] {
            let fragment = db.get_in_or_equal(builder)?;
            assert_eq!(matching(&mut db, &format!("id {}", fragment.sql), fragment.params)?, 0);
        }
        Ok(())
    }

    #[test]
    fn combined_named_fragments_run_on_a_positional_engine() -> Result<(), Box<dyn std::error::Error>> {
        let mut db = seeded()?;
        let names = db.get_in_or_equal(InOrEqualBuilder::new(["Bolt", "Nut", "Washer"]).named("n"))?;
        let visible = db.get_in_or_equal(InOrEqualBuilder::new([1]).named("v"))?;
        let select = format!("name {} AND visible {}", names.sql, visible.sql);
        assert_eq!(matching(&mut db, &select, merge(&[&names, &visible]))?, 2);

        let hidden = db.get_in_or_equal(InOrEqualBuilder::new([1]).named("v").negated())?;
        assert_eq!(matching(&mut db, &format!("visible {}", hidden.sql), hidden.params)?, 2);
        Ok(())
    }

    #[test]
    fn null_aware_lists() -> Result<(), Box<dyn std::error::Error>> {
        let mut db = seeded()?;
        let found = db.records_list(
            "widgets",
            "name",
            &[RowValues::Null, RowValues::from("Nut")],
            &Selection::new(),
        )?;
        assert_eq!(found.len(), 2);
        let unnamed = db.records("widgets", &FieldMap::new().with("name", RowValues::Null), &Selection::new())?;
        assert_eq!(unnamed.len(), 1);
        Ok(())
    }
}
