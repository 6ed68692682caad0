//! Storage error classification

/// A write collided with a UNIQUE index or primary key
#[derive(Debug, thiserror::Error)]
#[error("Duplicate record in {table}")]
pub struct DuplicateRecord {
    pub table: &'static str,
}

/// Wrap a failed write, surfacing unique violations as [`DuplicateRecord`]
pub(crate) fn write_error(err: sqlx::Error, table: &'static str, context: &'static str) -> anyhow::Error {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => DuplicateRecord { table }.into(),
        _ => anyhow::Error::new(err).context(context),
    }
}
