//! End-to-end: register domain types, mutate an entity behind a proxy,
//! diff it, push the record through the binary codec, and read it back
//! the way an audit sink would.

use std::sync::Arc;

use anyhow::Result;

use hallmark_audit::{AuditReader, decode, diff, encode, has_changes};
use hallmark_core::{FieldValue, KeyValue, MemberDef, MemberRegistry, MemberValue, ProxyRegistry};
use hallmark_engine::{EngineConfig, EqualityEngine};

#[derive(Debug, Clone)]
struct Money {
    amount: i64,
    currency: String,
}

#[derive(Debug, Clone)]
struct Order {
    status: String,
    total: Money,
    tracking: Option<String>,
}

/// Stand-in for a lazy-loading wrapper the mapping layer would generate.
#[derive(Debug)]
struct OrderProxy {
    inner: Order,
}

hallmark_core::describe!(Money, Order, OrderProxy);

fn engine() -> EqualityEngine {
    let catalog = MemberRegistry::new();
    catalog.register::<Money>(vec![
        MemberDef::of::<Money>("amount", |m| MemberValue::Int(m.amount)),
        MemberDef::of::<Money>("currency", |m| MemberValue::Str(&m.currency)),
    ]);
    catalog.register::<Order>(vec![
        MemberDef::of::<Order>("status", |o| MemberValue::Str(&o.status)),
        MemberDef::of::<Order>("total", |o| MemberValue::Nested(&o.total)),
        MemberDef::of::<Order>("tracking", |o| match &o.tracking {
            Some(code) => MemberValue::Str(code),
            None => MemberValue::Null,
        }),
    ]);
    catalog.register::<OrderProxy>(vec![
        MemberDef::of::<OrderProxy>("status", |o| MemberValue::Str(&o.inner.status)),
        MemberDef::of::<OrderProxy>("total", |o| MemberValue::Nested(&o.inner.total)),
        MemberDef::of::<OrderProxy>("tracking", |o| match &o.inner.tracking {
            Some(code) => MemberValue::Str(code),
            None => MemberValue::Null,
        }),
    ]);

    let proxies = ProxyRegistry::new();
    proxies.register::<OrderProxy, Order>();

    EqualityEngine::new(Arc::new(catalog), Arc::new(proxies), EngineConfig::default())
}

fn order(status: &str, amount: i64, tracking: Option<&str>) -> Order {
    Order {
        status: status.to_owned(),
        total: Money {
            amount,
            currency: "USD".to_owned(),
        },
        tracking: tracking.map(str::to_owned),
    }
}

#[test]
fn shipped_order_survives_the_full_pipeline() -> Result<()> {
    let engine = engine();

    // Before-state loaded lazily, so it arrives wrapped in a proxy.
    let before = OrderProxy {
        inner: order("New", 100, None),
    };
    let after = order("Shipped", 100, Some("ZX-1042"));

    assert!(has_changes(&engine, &before, &after)?);
    let record = diff(&engine, &before, &after, KeyValue::int(7001), "fulfillment")?;

    let names: Vec<_> = record
        .changed_fields
        .iter()
        .map(|c| c.field.as_str())
        .collect();
    assert_eq!(names, ["status", "tracking"]);

    let buf = encode(&record);
    let restored = decode(&buf)?;
    assert_eq!(restored, record);
    assert_eq!(restored.entity_key, KeyValue::Int(7001));
    assert_eq!(restored.actor, "fulfillment");
    Ok(())
}

#[test]
fn sink_can_stream_only_the_fields_it_wants() -> Result<()> {
    let engine = engine();
    let before = order("New", 100, None);
    let after = order("Shipped", 250, Some("ZX-1042"));

    let record = diff(&engine, &before, &after, KeyValue::int(7002), "ops")?;
    let buf = encode(&record);

    let mut reader = AuditReader::new(&buf)?;
    assert_eq!(reader.field_count(), 3);

    // Skip `status`, decode `total`, skip the rest.
    reader.skip_frame()?;
    let total = reader.next().expect("total frame")?;
    assert_eq!(total.name, "total");
    assert_eq!(
        total.new,
        FieldValue::Composite(vec![
            FieldValue::Int(250),
            FieldValue::Str("USD".to_owned()),
        ])
    );
    Ok(())
}

#[test]
fn json_export_matches_the_decoded_record() -> Result<()> {
    let engine = engine();
    let before = order("New", 100, None);
    let after = order("Cancelled", 100, None);

    let record = diff(&engine, &before, &after, KeyValue::int(7003), "support")?;
    let decoded = decode(&encode(&record))?;

    let json = serde_json::to_value(&decoded)?;
    assert_eq!(json["actor"], "support");
    assert_eq!(json["changed_fields"][0]["field"], "status");
    assert_eq!(json["changed_fields"][0]["new"]["str"], "Cancelled");
    Ok(())
}

#[test]
fn untouched_entity_produces_an_empty_record() -> Result<()> {
    let engine = engine();
    let state = order("New", 100, None);

    assert!(!has_changes(&engine, &state, &state.clone())?);
    let record = diff(&engine, &state, &state.clone(), KeyValue::int(7004), "ops")?;
    assert!(record.is_empty());

    let decoded = decode(&encode(&record))?;
    assert!(decoded.is_empty());
    Ok(())
}
