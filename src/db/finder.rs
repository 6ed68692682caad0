//! Runs parsed list queries against the store

use anyhow::Context;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::pool::Database;
use crate::query::sql::{bind_params, count_matching, select_page};
use crate::query::{CollectionSchema, ListQuery, QueryError};

/// One page of records and the size of the whole filtered set
#[derive(Debug, Clone)]
pub struct FoundPage<T> {
    pub records: Vec<T>,
    pub total: u64,
}

/// Count the filtered set, then fetch the requested page of it
pub async fn find_page<T, F>(
    db: &Database,
    schema: &CollectionSchema,
    query: &ListQuery,
    map_row: F,
) -> Result<FoundPage<T>, QueryError>
where
    F: Fn(&SqliteRow) -> anyhow::Result<T>,
{
    let count = count_matching(schema, query)?;
    let row = bind_params(sqlx::query(&count.sql), &count.params)
        .fetch_one(db.pool())
        .await
        .with_context(|| format!("Failed to count {}", schema.table))?;
    let total: i64 = row.try_get(0).context("Failed to read count")?;

    let page = select_page(schema, query)?;
    let rows = bind_params(sqlx::query(&page.sql), &page.params)
        .fetch_all(db.pool())
        .await
        .with_context(|| format!("Failed to list {}", schema.table))?;

    let records = rows
        .iter()
        .map(map_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(FoundPage {
        records,
        total: u64::try_from(total).unwrap_or(0),
    })
}
