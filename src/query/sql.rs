//! SQL rendering for parsed list queries
//!
//! Field names from the request are resolved through the collection schema
//! and only schema columns reach the SQL text; operand values are always
//! bound as parameters. A filter on an unknown field matches no record;
//! unknown sort and select fields are ignored.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use super::parse::{CompareOp, Condition, ListQuery, SortKey};
use super::schema::{CollectionSchema, FieldDef, FieldKind};
use super::QueryError;

/// A bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// SQL text with its positional parameters
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn push_param(&mut self, value: SqlValue) -> &'static str {
        self.params.push(value);
        "?"
    }
}

/// Bind every parameter of a rendered query, in order
pub fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// `SELECT <columns> ... ORDER BY ... LIMIT ? OFFSET ?` for one page
pub fn select_page(schema: &CollectionSchema, query: &ListQuery) -> Result<QueryBuf, QueryError> {
    let mut buf = QueryBuf::default();
    let where_sql = where_clause(schema, &query.filter, &mut buf)?;
    let order_sql = order_clause(schema, &query.sort);
    let limit = buf.push_param(SqlValue::Integer(i64::from(query.window.limit)));
    let offset = buf.push_param(SqlValue::Integer(
        i64::try_from(query.window.skip()).unwrap_or(i64::MAX),
    ));
    buf.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        schema.columns, schema.table, where_sql, order_sql, limit, offset
    );
    Ok(buf)
}

/// `SELECT COUNT(*)` over the same filter, ignoring the page window
pub fn count_matching(schema: &CollectionSchema, query: &ListQuery) -> Result<QueryBuf, QueryError> {
    let mut buf = QueryBuf::default();
    let where_sql = where_clause(schema, &query.filter, &mut buf)?;
    buf.sql = format!("SELECT COUNT(*) FROM {}{}", schema.table, where_sql);
    Ok(buf)
}

fn where_clause(
    schema: &CollectionSchema,
    filter: &[Condition],
    buf: &mut QueryBuf,
) -> Result<String, QueryError> {
    let mut predicates = Vec::with_capacity(filter.len());
    for condition in filter {
        let Some(field) = schema.field(&condition.field) else {
            tracing::debug!(
                "Filter on unknown field '{}' of {} matches nothing",
                condition.field,
                schema.table
            );
            predicates.push("0 = 1".to_string());
            continue;
        };
        predicates.push(predicate(schema, field, condition, buf)?);
    }

    if predicates.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", predicates.join(" AND ")))
    }
}

fn predicate(
    schema: &CollectionSchema,
    field: &FieldDef,
    condition: &Condition,
    buf: &mut QueryBuf,
) -> Result<String, QueryError> {
    let column = format!("\"{}\".\"{}\"", schema.table, field.column);
    let values = condition
        .operand
        .values()
        .iter()
        .map(|raw| convert(field, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let placeholders = |buf: &mut QueryBuf, values: Vec<SqlValue>| {
        values
            .into_iter()
            .map(|v| buf.push_param(v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    if field.kind == FieldKind::TextList {
        let element = match condition.op {
            CompareOp::Eq => format!("= {}", placeholders(buf, values)),
            CompareOp::In => format!("IN ({})", placeholders(buf, values)),
            op => {
                return Err(QueryError::malformed(format!(
                    "Operator '{}' is not supported on list field '{}'",
                    op.as_str(),
                    field.name
                )))
            }
        };
        return Ok(format!(
            "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value {})",
            column, element
        ));
    }

    let sql = match condition.op {
        CompareOp::Eq => format!("{} = {}", column, placeholders(buf, values)),
        CompareOp::Gt => format!("{} > {}", column, placeholders(buf, values)),
        CompareOp::Gte => format!("{} >= {}", column, placeholders(buf, values)),
        CompareOp::Lt => format!("{} < {}", column, placeholders(buf, values)),
        CompareOp::Lte => format!("{} <= {}", column, placeholders(buf, values)),
        CompareOp::In => format!("{} IN ({})", column, placeholders(buf, values)),
    };
    Ok(sql)
}

fn order_clause(schema: &CollectionSchema, sort: &[SortKey]) -> String {
    if sort.is_empty() {
        return " ORDER BY \"created_at\" DESC, \"id\" DESC".to_string();
    }

    let mut terms = Vec::with_capacity(sort.len() + 1);
    let mut has_id = false;
    for key in sort {
        let Some(field) = schema.field(&key.field) else {
            tracing::debug!("Ignoring sort on unknown field '{}' of {}", key.field, schema.table);
            continue;
        };
        has_id |= field.column == "id";
        terms.push(format!(
            "\"{}\" {}",
            field.column,
            if key.descending { "DESC" } else { "ASC" }
        ));
    }
    if !has_id {
        terms.push("\"id\" ASC".to_string());
    }
    format!(" ORDER BY {}", terms.join(", "))
}

/// Convert operand text to the storage type of a field
fn convert(field: &FieldDef, raw: &str) -> Result<SqlValue, QueryError> {
    let invalid = |what: &str| {
        QueryError::malformed(format!(
            "Invalid {} '{}' for field '{}'",
            what, raw, field.name
        ))
    };
    let trimmed = raw.trim();

    match field.kind {
        FieldKind::Text | FieldKind::TextList => Ok(SqlValue::Text(raw.to_string())),
        FieldKind::Integer => trimmed
            .parse::<i64>()
            .map(SqlValue::Integer)
            .or_else(|_| parse_real(trimmed).map(SqlValue::Real))
            .map_err(|_| invalid("number")),
        FieldKind::Real => parse_real(trimmed)
            .map(SqlValue::Real)
            .map_err(|_| invalid("number")),
        FieldKind::Bool => match trimmed {
            "true" | "1" => Ok(SqlValue::Integer(1)),
            "false" | "0" => Ok(SqlValue::Integer(0)),
            _ => Err(invalid("boolean")),
        },
        FieldKind::Timestamp => parse_timestamp(trimmed)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| invalid("date")),
    }
}

fn parse_real(raw: &str) -> Result<f64, ()> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(()),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;

    const FIELDS: &[FieldDef] = &[
        FieldDef::new("id", "id", FieldKind::Integer),
        FieldDef::new("title", "title", FieldKind::Text),
        FieldDef::new("tuition", "tuition", FieldKind::Real),
        FieldDef::new("weeks", "weeks", FieldKind::Integer),
        FieldDef::new("scholarshipAvailable", "scholarship_available", FieldKind::Bool),
        FieldDef::new("careers", "careers", FieldKind::TextList),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ];

    const SCHEMA: CollectionSchema = CollectionSchema {
        table: "courses",
        columns: "id, title",
        fields: FIELDS,
    };

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        ListQuery::from_pairs(pairs.iter().copied(), &PaginationConfig::default()).unwrap()
    }

    #[test]
    fn test_default_page() {
        let buf = select_page(&SCHEMA, &query(&[])).unwrap();
        assert_eq!(
            buf.sql,
            "SELECT id, title FROM courses ORDER BY \"created_at\" DESC, \"id\" DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(buf.params, vec![SqlValue::Integer(25), SqlValue::Integer(0)]);
    }

    #[test]
    fn test_filters_and_sort() {
        let buf = select_page(
            &SCHEMA,
            &query(&[
                ("tuition[gte]", "1000"),
                ("weeks", "lt(10)"),
                ("sort", "-tuition"),
                ("page", "3"),
                ("limit", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(
            buf.sql,
            "SELECT id, title FROM courses WHERE \"courses\".\"tuition\" >= ? AND \"courses\".\"weeks\" < ? \
             ORDER BY \"tuition\" DESC, \"id\" ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            buf.params,
            vec![
                SqlValue::Real(1000.0),
                SqlValue::Integer(10),
                SqlValue::Integer(5),
                SqlValue::Integer(10),
            ]
        );
    }

    #[test]
    fn test_in_list() {
        let buf = count_matching(&SCHEMA, &query(&[("title[in]", "Rust,Go")])).unwrap();
        assert_eq!(
            buf.sql,
            "SELECT COUNT(*) FROM courses WHERE \"courses\".\"title\" IN (?, ?)"
        );
        assert_eq!(
            buf.params,
            vec![SqlValue::Text("Rust".into()), SqlValue::Text("Go".into())]
        );
    }

    #[test]
    fn test_list_field_membership() {
        let buf = count_matching(&SCHEMA, &query(&[("careers", "Business")])).unwrap();
        assert_eq!(
            buf.sql,
            "SELECT COUNT(*) FROM courses WHERE EXISTS (SELECT 1 FROM json_each(\"courses\".\"careers\") WHERE json_each.value = ?)"
        );

        let err = count_matching(&SCHEMA, &query(&[("careers[gt]", "B")])).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn test_unknown_filter_field_matches_nothing() {
        let buf = count_matching(&SCHEMA, &query(&[("password", "x"), ("nope[gt]", "1")])).unwrap();
        assert_eq!(buf.sql, "SELECT COUNT(*) FROM courses WHERE 0 = 1 AND 0 = 1");
        assert!(buf.params.is_empty());
    }

    #[test]
    fn test_unknown_sort_field_ignored() {
        let buf = select_page(&SCHEMA, &query(&[("sort", "bogus")])).unwrap();
        assert!(buf.sql.contains("ORDER BY \"id\" ASC LIMIT"));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        for (key, value) in [
            ("tuition[gt]", "cheap"),
            ("weeks", "many"),
            ("scholarshipAvailable", "maybe"),
            ("createdAt[gte]", "yesterday"),
        ] {
            let err = count_matching(&SCHEMA, &query(&[(key, value)])).unwrap_err();
            assert!(matches!(err, QueryError::Malformed(_)), "{}={}", key, value);
        }
    }

    #[test]
    fn test_operand_conversion() {
        let weeks = SCHEMA.field("weeks").unwrap();
        assert_eq!(convert(weeks, "4.5").unwrap(), SqlValue::Real(4.5));

        let flag = SCHEMA.field("scholarshipAvailable").unwrap();
        assert_eq!(convert(flag, "true").unwrap(), SqlValue::Integer(1));
        assert_eq!(convert(flag, "0").unwrap(), SqlValue::Integer(0));

        let created = SCHEMA.field("createdAt").unwrap();
        let SqlValue::Timestamp(ts) = convert(created, "2024-03-01").unwrap() else {
            panic!("expected timestamp");
        };
        assert_eq!(ts.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(convert(created, "2024-03-01T12:00:00Z").is_ok());

        let tuition = SCHEMA.field("tuition").unwrap();
        assert!(convert(tuition, "NaN").is_err());
    }

    #[test]
    fn test_explicit_id_sort_not_duplicated() {
        let buf = select_page(&SCHEMA, &query(&[("sort", "-id")])).unwrap();
        assert!(buf.sql.contains("ORDER BY \"id\" DESC LIMIT"));
    }
}
