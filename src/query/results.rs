//! List response assembly: projection, reference expansion, envelope

use std::collections::HashMap;

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};

use super::pagination::Pagination;
use super::parse::ListQuery;
use super::QueryError;

/// `{success, count, pagination, data}` body of a list endpoint
///
/// `count` is the number of records on this page; pagination links are
/// computed against the filtered total.
#[derive(Debug, Clone, Serialize)]
pub struct AdvancedResults {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Value>,
}

impl AdvancedResults {
    /// Serialize and project one page of records
    pub fn build<T: Serialize>(
        records: &[T],
        total: u64,
        query: &ListQuery,
    ) -> Result<Self, QueryError> {
        let select = query.select.as_deref();
        let data = records
            .iter()
            .map(|record| {
                serde_json::to_value(record)
                    .map(|doc| project(doc, select))
                    .context("Failed to serialize record")
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            success: true,
            count: data.len(),
            pagination: query.window.pagination(total),
            data,
        })
    }
}

/// Keep only the selected keys of an object, plus `id`
pub fn project(doc: Value, select: Option<&[String]>) -> Value {
    let Some(select) = select else {
        return doc;
    };
    match doc {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key == "id" || select.iter().any(|s| s == key))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Distinct integer ids held under `field`
pub fn reference_ids(docs: &[Value], field: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = docs
        .iter()
        .filter_map(|doc| doc.get(field).and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Replace the id under `field` with the related record
///
/// Documents where `field` was projected away are left untouched. Dangling
/// references become `null`.
pub fn expand_reference(docs: &mut [Value], field: &str, related: &HashMap<i64, Value>) {
    for doc in docs {
        let Some(slot) = doc.get_mut(field) else {
            continue;
        };
        if let Some(id) = slot.as_i64() {
            *slot = related.get(&id).cloned().unwrap_or(Value::Null);
        }
    }
}

/// Attach child records to each document under `field`, keyed by its `id`
pub fn attach_children(docs: &mut [Value], field: &str, children: &HashMap<i64, Vec<Value>>) {
    for doc in docs {
        let Some(id) = doc.get("id").and_then(Value::as_i64) else {
            continue;
        };
        if let Value::Object(map) = doc {
            let list = children.get(&id).cloned().unwrap_or_default();
            map.insert(field.to_string(), Value::Array(list));
        }
    }
}
