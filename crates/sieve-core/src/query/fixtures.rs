//! Shared test schema and records: invoices, customers and their addresses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sieve_proto::{Object, Value};

use crate::catalog::{Catalog, EntityDef, FieldDef, FieldType, ScalarType, SchemaBundle};

pub(crate) fn invoice_catalog() -> Catalog {
    let bundle = SchemaBundle::new(1)
        .with_entity(
            EntityDef::new("Invoice", "id")
                .with_field(FieldDef::scalar("id", ScalarType::Int64))
                .with_field(FieldDef::scalar("number", ScalarType::String))
                .with_field(FieldDef::scalar("amount", ScalarType::Decimal))
                .with_field(FieldDef::scalar("issuedAt", ScalarType::Timestamp))
                .with_field(FieldDef::scalar("dueOn", ScalarType::LocalDate))
                .with_field(FieldDef::scalar("paid", ScalarType::Bool))
                .with_field(FieldDef::new(
                    "status",
                    FieldType::enumeration(
                        "InvoiceStatus",
                        vec!["DRAFT".into(), "OPEN".into(), "PAID".into()],
                    ),
                ))
                .with_field(FieldDef::new("key", FieldType::composite_key("InvoiceKey")))
                .with_field(FieldDef::new("customer", FieldType::to_one("Customer")))
                .with_field(FieldDef::new("lines", FieldType::to_many("InvoiceLine"))),
        )
        .with_entity(
            EntityDef::embeddable("InvoiceKey")
                .with_field(FieldDef::scalar("series", ScalarType::String))
                .with_field(FieldDef::scalar("year", ScalarType::Int32)),
        )
        .with_entity(
            EntityDef::new("Customer", "id")
                .with_field(FieldDef::scalar("id", ScalarType::Int64))
                .with_field(FieldDef::scalar("name", ScalarType::String))
                .with_field(FieldDef::new("address", FieldType::embedded("Address"))),
        )
        .with_entity(
            EntityDef::embeddable("Address")
                .with_field(FieldDef::scalar("street", ScalarType::String))
                .with_field(FieldDef::new("city", FieldType::to_one("City"))),
        )
        .with_entity(
            EntityDef::new("City", "id")
                .with_field(FieldDef::scalar("id", ScalarType::Int64))
                .with_field(FieldDef::scalar("name", ScalarType::String)),
        )
        .with_entity(
            EntityDef::new("InvoiceLine", "id")
                .with_field(FieldDef::scalar("id", ScalarType::Int64))
                .with_field(FieldDef::scalar("product", ScalarType::String))
                .with_field(FieldDef::scalar("quantity", ScalarType::Int32))
                .with_field(FieldDef::scalar("price", ScalarType::Decimal)),
        );

    match Catalog::from_bundle(bundle) {
        Ok(catalog) => catalog,
        Err(e) => panic!("test schema is invalid: {e}"),
    }
}

fn object(entries: Vec<(&str, Value)>) -> Object {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn invoice(
    id: i64,
    number: &str,
    amount: &str,
    issued_at: &str,
    status: &str,
    customer: (i64, &str, &str),
    lines: usize,
) -> Object {
    let (customer_id, customer_name, city) = customer;
    let amount = match Decimal::from_str(amount) {
        Ok(d) => d,
        Err(e) => panic!("bad amount {amount}: {e}"),
    };
    let issued_at = match DateTime::parse_from_rfc3339(issued_at) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => panic!("bad timestamp {issued_at}: {e}"),
    };

    let line_items = (0..lines)
        .map(|i| {
            Value::Object(object(vec![
                ("id", Value::Int(id * 100 + i as i64)),
                ("product", Value::from(format!("P-{i}"))),
                ("quantity", Value::Int(i as i64 + 1)),
                ("price", Value::Decimal(Decimal::from(10))),
            ]))
        })
        .collect();

    object(vec![
        ("id", Value::Int(id)),
        ("number", Value::from(number)),
        ("amount", Value::Decimal(amount)),
        ("issuedAt", Value::Timestamp(issued_at)),
        ("paid", Value::Bool(status == "PAID")),
        ("status", Value::from(status)),
        (
            "customer",
            Value::Object(object(vec![
                ("id", Value::Int(customer_id)),
                ("name", Value::from(customer_name)),
                (
                    "address",
                    Value::Object(object(vec![
                        ("street", Value::from("1 Main St")),
                        (
                            "city",
                            Value::Object(object(vec![
                                ("id", Value::Int(customer_id * 10)),
                                ("name", Value::from(city)),
                            ])),
                        ),
                    ])),
                ),
            ])),
        ),
        ("lines", Value::List(line_items)),
    ])
}

/// Six invoices over three customers.
pub(crate) fn invoice_records() -> Vec<Object> {
    vec![
        invoice(1, "INV-001", "120.00", "2024-03-01T09:00:00Z", "PAID", (1, "Acme Corp", "Paris"), 2),
        invoice(2, "INV-002", "80.50", "2024-03-02T10:30:00Z", "OPEN", (2, "Globex", "Lyon"), 1),
        invoice(3, "INV-003", "150.00", "2024-03-03T11:00:00Z", "OPEN", (1, "Acme Corp", "Paris"), 0),
        invoice(4, "INV-004", "150.00", "2024-03-05T23:30:00Z", "PAID", (3, "Initech", "Paris"), 3),
        invoice(5, "inv-005", "199.99", "2024-03-05T08:00:00Z", "DRAFT", (2, "Globex", "Lyon"), 1),
        invoice(6, "INV-006", "250.00", "2024-03-06T12:00:00Z", "OPEN", (3, "Initech", "Paris"), 2),
    ]
}
