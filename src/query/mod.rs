//! List query translation
//!
//! Turns the flat key/value pairs of a list request into a typed
//! [`ListQuery`] (filter conditions, projection, ordering and page window),
//! renders it as parameterized SQL for a [`CollectionSchema`], and assembles
//! the `{success, count, pagination, data}` envelope returned by list
//! endpoints.
//!
//! ```text
//! ?price[gte]=1000&careers=in(Business,UI/UX)&select=name,price&sort=-price&page=2&limit=10
//! ```

pub mod pagination;
pub mod parse;
pub mod results;
pub mod schema;
pub mod sql;

pub use pagination::{PageRef, PageWindow, Pagination};
pub use parse::{CompareOp, Condition, ListQuery, Operand, SortKey};
pub use results::{attach_children, expand_reference, project, reference_ids, AdvancedResults};
pub use schema::{CollectionSchema, FieldDef, FieldKind};

/// Errors produced while translating or running a list query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query string could not be understood
    #[error("{0}")]
    Malformed(String),

    /// The store failed while running a well-formed query
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl QueryError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
