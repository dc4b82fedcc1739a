//! Integration tests for merging, resolution and history lookups.
//!
//! Exercises the public model API end to end:
//! - Configuration::update() - merge precedence and foreign parameters
//! - Configuration::resolve() - best-effort versus strict passes
//! - Configuration::pvalue() - most recent definition and history

use cfgweave::error::ConfError;
use cfgweave::model::{Category, Configuration, ParamType, Parameter};
use cfgweave::resolver::{ExprResolver, ResolveOptions};
use serde_json::json;

fn resolve(conf: &mut Configuration) {
    conf.resolve(&ExprResolver, &ResolveOptions::default())
        .expect("best-effort resolution never aborts");
}

/// Category A with a literal, an underscore name and a broken expression.
fn category_a() -> Category {
    Category::with_params(
        "main",
        [
            Parameter::new("a").with_value("a"),
            Parameter::new("_").with_value(2),
            Parameter::new("error").with_svalue("1 +"),
        ],
    )
}

fn category_b() -> Category {
    Category::with_params(
        "main",
        [
            Parameter::new("a").with_value("b"),
            Parameter::new("b").with_value("b"),
        ],
    )
}

#[test]
fn test_merge_overrides_and_adds_foreigns() {
    let mut conf = Configuration::from_category(category_a());
    resolve(&mut conf);
    conf.update(&Configuration::from_category(category_b()));

    let main = conf.category("main").unwrap();
    let a = main.get("a").unwrap();
    assert_eq!(a.value(), &json!("b"));
    assert!(a.is_local());

    let underscore = main.get("_").unwrap();
    assert_eq!(underscore.value(), &json!(2));
    assert!(underscore.is_local());

    let error = main.get("error").unwrap();
    assert!(error.is_local());
    assert!(error.has_error());

    let b = main.get("b").unwrap();
    assert_eq!(b.value(), &json!("b"));
    assert!(!b.is_local());
}

#[test]
fn test_unify_splits_views() {
    let mut conf = Configuration::from_category(category_a());
    conf.update(&Configuration::from_category(category_b()));
    resolve(&mut conf);

    let unified = conf.unify();
    let values: Vec<&str> = unified.values().names().collect();
    assert_eq!(values, vec!["a", "_"]);
    assert_eq!(unified.foreigns().names().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(unified.errors().names().collect::<Vec<_>>(), vec!["error"]);
    assert!(unified.applicable(true).all(|p| !p.has_error()));
    assert_eq!(unified.applicable(false).count(), 2);
}

#[test]
fn test_declared_type_guards_overrides() {
    let mut conf = Configuration::from_category(Category::with_params(
        "server",
        [Parameter::new("port").with_value(80).with_vtype(ParamType::Int)],
    ));
    let overrides = Configuration::from_category(Category::with_params(
        "server",
        [Parameter::new("port").with_value("not a port")],
    ));
    conf.update(&overrides);
    assert_eq!(conf.pvalue("port", None, 0).unwrap(), &json!(80));

    let overrides = Configuration::from_category(Category::with_params(
        "server",
        [Parameter::new("port").with_value("8080")],
    ));
    conf.update(&overrides);
    resolve(&mut conf);
    assert_eq!(conf.pvalue("port", None, 0).unwrap(), &json!(8080));
}

#[test]
fn test_expressions_see_earlier_parameters() {
    let mut conf = Configuration::from_categories([
        Category::with_params(
            "base",
            [
                Parameter::new("workers").with_value(4),
                Parameter::new("name").with_value("svc"),
            ],
        ),
        Category::with_params(
            "derived",
            [
                Parameter::new("queue").with_svalue("workers * 25"),
                Parameter::new("label").with_svalue("upper(name) + '-' + str(queue)"),
            ],
        ),
    ]);
    let summary = conf
        .resolve(&ExprResolver, &ResolveOptions::default())
        .unwrap();
    assert_eq!(summary.failed, 0);
    assert_eq!(conf.pvalue("queue", None, 0).unwrap(), &json!(100));
    assert_eq!(conf.pvalue("label", None, 0).unwrap(), &json!("SVC-100"));
}

#[test]
fn test_strict_resolution_aborts() {
    let mut conf = Configuration::from_category(category_a());
    let options = ResolveOptions {
        besteffort: false,
        ..Default::default()
    };
    let err = conf.resolve(&ExprResolver, &options).unwrap_err();
    match err {
        ConfError::Resolution(failure) => assert_eq!(failure.parameter, "error"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(conf.category("main").unwrap().get("error").unwrap().has_error());
}

#[test]
fn test_safe_mode_hides_environment() {
    let mut conf = Configuration::from_category(Category::with_params(
        "env",
        [Parameter::new("home").with_svalue("env('PATH')")],
    ));
    resolve(&mut conf);
    assert!(conf.errors().any(|p| p.name() == "home"));

    let options = ResolveOptions {
        safe: false,
        ..Default::default()
    };
    conf.resolve(&ExprResolver, &options).unwrap();
    assert_eq!(conf.errors().count(), 0);
}

#[test]
fn test_history_walks_back_through_definitions() {
    let conf = Configuration::from_categories([
        Category::with_params("defaults", [Parameter::new("level").with_value("info")]),
        Category::with_params("site", [Parameter::new("level").with_value("warn")]),
        Category::with_params("local", [Parameter::new("level").with_value("debug")]),
    ]);

    assert_eq!(conf.pvalue("level", None, 0).unwrap(), &json!("debug"));
    assert_eq!(conf.pvalue("level", None, 2).unwrap(), &json!("info"));
    assert_eq!(conf.pvalue("level", Some("site"), 0).unwrap(), &json!("warn"));
    assert_eq!(conf.pvalue("level", Some("site"), 1).unwrap(), &json!("info"));

    assert!(matches!(
        conf.pvalue("level", None, 3),
        Err(ConfError::HistoryOutOfRange { available: 3, .. })
    ));
    assert!(matches!(
        conf.pvalue("level", Some("missing"), 0),
        Err(ConfError::CategoryNotFound(_))
    ));
    assert!(conf.pvalue("color", None, 0).unwrap_err().is_lookup());
}
