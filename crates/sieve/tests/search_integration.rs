//! End-to-end tests: JSON schema, JSON search documents, in-memory engine.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use sieve::proto::{Object, SearchCriteria, Value};
use sieve::{Catalog, CompilerConfig, Error, MemoryEngine, ResultSet, SchemaBundle, Sieve, SieveConfig};

const SCHEMA: &str = r#"{
    "version": 1,
    "entities": {
        "Order": {
            "name": "Order",
            "identity_field": "id",
            "fields": [
                {"name": "id", "field_type": {"Scalar": "Int64"}},
                {"name": "reference", "field_type": {"Scalar": "String"}},
                {"name": "total", "field_type": {"Scalar": "Decimal"}},
                {"name": "placedOn", "field_type": {"Scalar": "LocalDate"}},
                {"name": "status", "field_type": {"Enum": {"name": "OrderStatus", "variants": ["NEW", "SHIPPED"]}}},
                {"name": "customer", "field_type": {"Relation": {"entity": "Customer", "cardinality": "ToOne"}}}
            ]
        },
        "Customer": {
            "name": "Customer",
            "identity_field": "id",
            "fields": [
                {"name": "id", "field_type": {"Scalar": "Int64"}},
                {"name": "name", "field_type": {"Scalar": "String"}},
                {"name": "email", "field_type": {"Scalar": "String"}}
            ]
        }
    }
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sieve=debug,sieve_core=debug")
        .with_test_writer()
        .try_init();
}

fn order(id: i64, reference: &str, total: &str, placed_on: (i32, u32, u32), status: &str, customer: (i64, &str)) -> Object {
    let mut buyer = Object::new();
    buyer.insert("id".into(), Value::Int(customer.0));
    buyer.insert("name".into(), Value::from(customer.1));
    buyer.insert(
        "email".into(),
        Value::from(format!("{}@example.com", customer.1.to_lowercase())),
    );

    let mut record = Object::new();
    record.insert("id".into(), Value::Int(id));
    record.insert("reference".into(), Value::from(reference));
    record.insert("total".into(), Value::from(Decimal::from_str(total).unwrap()));
    record.insert(
        "placedOn".into(),
        Value::from(NaiveDate::from_ymd_opt(placed_on.0, placed_on.1, placed_on.2).unwrap()),
    );
    record.insert("status".into(), Value::from(status));
    record.insert("customer".into(), Value::from(buyer));
    record
}

fn service(config: SieveConfig) -> Sieve {
    init_tracing();
    let catalog = Catalog::from_bundle(SchemaBundle::from_json(SCHEMA).unwrap()).unwrap();
    let engine = MemoryEngine::new().with_records(
        "Order",
        vec![
            order(1, "SO-100", "42.00", (2024, 5, 1), "NEW", (1, "Ada")),
            order(2, "SO-101", "18.50", (2024, 5, 2), "SHIPPED", (2, "Grace")),
            order(3, "SO-102", "99.90", (2024, 5, 2), "SHIPPED", (1, "Ada")),
            order(4, "RET-001", "5.00", (2024, 5, 3), "NEW", (3, "Linus")),
        ],
    );
    Sieve::new(Arc::new(catalog), Arc::new(engine), config)
}

fn ids(result: &ResultSet) -> Vec<i64> {
    result
        .records()
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect()
}

#[test]
fn test_search_document() {
    let sieve = service(SieveConfig::default().with_debug(true));
    let criteria = SearchCriteria::from_json(
        r#"{
            "entity": "Order",
            "filters": {
                "reference": {"comparador": "STARTS_WITH", "values": ["so-"]},
                "customer.name": {"comparador": "NE", "values": ["grace"]}
            },
            "orders": {"total": "DESC"},
            "pageSize": 5
        }"#,
    )
    .unwrap();

    let page = sieve.search_page(&criteria).unwrap();
    assert_eq!(ids(&page.items), vec![3, 1]);
    assert_eq!(page.total, 2);
}

#[test]
fn test_search_json_round_trip() {
    let sieve = service(SieveConfig::default());
    let result = sieve
        .search_json(
            r#"{
                "entity": "Order",
                "functions": {"status": "status", "count": "id", "sum": "total"},
                "groupBy": ["status"],
                "orders": {"status": "ASC"}
            }"#,
        )
        .unwrap();

    assert_eq!(
        result,
        serde_json::json!({
            "kind": "rows",
            "data": [
                {"status": "NEW", "count": 2, "sum": "47.00"},
                {"status": "SHIPPED", "count": 2, "sum": "118.40"}
            ]
        })
    );
}

#[test]
fn test_local_date_between_and_count() {
    let sieve = service(SieveConfig::default());
    let criteria = SearchCriteria::from_json(
        r#"{
            "entity": "Order",
            "filters": {"placedOn": {"comparador": "BETWEEN", "values": ["2024-05-02", "03/05/2024"]}},
            "pageSize": 1,
            "first": 1
        }"#,
    )
    .unwrap();

    assert_eq!(ids(&sieve.search(&criteria).unwrap()), vec![3]);
    assert_eq!(sieve.count(&criteria).unwrap(), 3);
    assert!(sieve.exists(&criteria).unwrap());
}

#[test]
fn test_dto_mapping_through_document() {
    let sieve = service(SieveConfig::default()).with_mapper("Order", |record: Object| {
        let mut dto = Object::new();
        dto.insert("id".into(), record["id"].clone());
        dto.insert("label".into(), Value::from(format!("{} ({})", record["reference"], record["status"])));
        dto
    });

    let criteria = SearchCriteria::from_json(
        r#"{"entity": "Order", "filters": {"id": 4}, "resolveDto": true, "singleResult": true}"#,
    )
    .unwrap();
    let record = sieve.search_one(&criteria).unwrap().unwrap();
    assert_eq!(record["label"], Value::from("RET-001 (NEW)"));
}

#[test]
fn test_compiler_settings_apply() {
    let config = SieveConfig::new().with_compiler(CompilerConfig::new().with_like_escape('!'));
    let sieve = service(config);
    let criteria = SearchCriteria::from_json(
        r#"{"entity": "Order", "filters": {"reference": {"comparador": "LIKE", "values": ["_1"]}}}"#,
    )
    .unwrap();

    let plan = sieve.compile(&criteria).unwrap();
    assert!(plan.to_string().contains("LIKE '%!_1%' ESCAPE '!'"));
    assert!(sieve.search(&criteria).unwrap().is_empty());
}

#[test]
fn test_malformed_document() {
    let sieve = service(SieveConfig::default());
    let result = sieve.search_json(r#"{"filters": {}}"#);
    assert!(matches!(result, Err(Error::Protocol(_))));
}
