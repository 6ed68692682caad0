//! Queryable collection descriptions
//!
//! A [`CollectionSchema`] lists the fields a list query may filter, sort and
//! project on. Names and columns are compile-time constants, so they are safe
//! to splice into SQL; anything a client sends is checked against this list.

/// Storage type of a queryable field, used to convert operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    /// Stored as 0/1, queried as `true`/`false`
    Bool,
    /// RFC 3339 or `YYYY-MM-DD` operands
    Timestamp,
    /// JSON array of strings; matches when any element matches
    TextList,
}

/// A field as seen by clients, and the column backing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// A table that list queries can run against
#[derive(Debug)]
pub struct CollectionSchema {
    pub table: &'static str,
    /// Column list selected for each record
    pub columns: &'static str,
    pub fields: &'static [FieldDef],
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}
