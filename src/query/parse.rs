//! Query-string parsing for list endpoints
//!
//! Reserved keys (`select`, `sort`, `page`, `limit`) configure the result
//! shape. Every other key is a filter condition on a field:
//!
//! | form                  | meaning                       |
//! |-----------------------|-------------------------------|
//! | `field=value`         | equality                      |
//! | `field[gte]=value`    | comparison (`gt gte lt lte`)  |
//! | `field[in]=a,b`       | membership                    |
//! | `field=gte(value)`    | comparison, value form        |
//! | `field=in(a,b)`       | membership, value form        |
//! | `field=gte100`        | comparison on a number        |
//!
//! Operator tokens are only recognised in operator position, never inside
//! field names or plain values.

use crate::config::PaginationConfig;

use super::pagination::PageWindow;
use super::QueryError;

/// Comparison applied by a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl CompareOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

/// Raw operand text, converted against the field type when rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Single(String),
    List(Vec<String>),
}

impl Operand {
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::List(values) => values,
        }
    }
}

/// `field <op> operand`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// A fully parsed list request
///
/// Conditions are combined with AND. An empty `sort` means newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Vec<Condition>,
    pub select: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub window: PageWindow,
}

impl ListQuery {
    /// First page, default size, no filter
    pub fn first_page(limits: &PaginationConfig) -> Self {
        Self {
            filter: Vec::new(),
            select: None,
            sort: Vec::new(),
            window: PageWindow::new(1, limits.default_limit),
        }
    }

    /// Parse decoded query pairs
    ///
    /// Invalid or non-positive `page`/`limit` values fall back to their
    /// defaults; `limit` is capped at `max_limit`. Malformed operator syntax
    /// is rejected.
    pub fn from_pairs<I, K, V>(pairs: I, limits: &PaginationConfig) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::first_page(limits);
        let mut page = 1;
        let mut limit = limits.default_limit;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "select" => query.select = parse_select(value),
                "sort" => query.sort = parse_sort(value),
                "page" => page = parse_positive(value).unwrap_or(1),
                "limit" => limit = parse_positive(value).unwrap_or(limits.default_limit),
                _ => query.filter.push(parse_condition(key, value)?),
            }
        }

        query.window = PageWindow::new(page, limit.min(limits.max_limit));
        Ok(query)
    }

    /// Append an equality condition, used to scope a list to a parent record
    pub fn with_equal(mut self, field: &str, value: impl ToString) -> Self {
        self.filter.push(Condition {
            field: field.to_string(),
            op: CompareOp::Eq,
            operand: Operand::Single(value.to_string()),
        });
        self
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_select(raw: &str) -> Option<Vec<String>> {
    let fields = split_list(raw);
    (!fields.is_empty()).then_some(fields)
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    split_list(raw)
        .into_iter()
        .filter_map(|token| {
            let (field, descending) = match token.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (token.strip_prefix('+').unwrap_or(&token), false),
            };
            (!field.is_empty()).then(|| SortKey {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

fn parse_condition(key: &str, value: &str) -> Result<Condition, QueryError> {
    let (field, bracket_op) = parse_key(key)?;
    let (op, raw) = match bracket_op {
        Some(op) => (op, value),
        None => parse_value(&field, value)?,
    };
    let operand = build_operand(&field, op, raw)?;
    Ok(Condition { field, op, operand })
}

/// `field` or `field[op]`
fn parse_key(key: &str) -> Result<(String, Option<CompareOp>), QueryError> {
    let Some(open) = key.find('[') else {
        if key.contains(']') {
            return Err(QueryError::malformed(format!("Malformed filter key '{}'", key)));
        }
        return Ok((key.to_string(), None));
    };

    let field = &key[..open];
    let token = key[open + 1..]
        .strip_suffix(']')
        .filter(|t| !t.contains(|c: char| c == '[' || c == ']'))
        .ok_or_else(|| QueryError::malformed(format!("Malformed filter key '{}'", key)))?;

    if field.is_empty() {
        return Err(QueryError::malformed(format!(
            "Missing field name in filter key '{}'",
            key
        )));
    }

    let op = CompareOp::from_token(token).ok_or_else(|| {
        QueryError::malformed(format!(
            "Unknown comparison operator '{}' in filter key '{}'",
            token, key
        ))
    })?;

    Ok((field.to_string(), Some(op)))
}

/// Operator embedded in the value: `op(inner)` or a bare numeric prefix
fn parse_value<'a>(field: &str, value: &'a str) -> Result<(CompareOp, &'a str), QueryError> {
    if let Some(open) = value.find('(') {
        if let Some(op) = CompareOp::from_token(&value[..open]) {
            let inner = value[open + 1..].strip_suffix(')').ok_or_else(|| {
                QueryError::malformed(format!(
                    "Unterminated '{}(' in filter on '{}'",
                    op.as_str(),
                    field
                ))
            })?;
            return Ok((op, inner));
        }
    }

    // longest token first so "gte5" is not read as "gt" + "e5"
    for op in [CompareOp::Gte, CompareOp::Lte, CompareOp::Gt, CompareOp::Lt] {
        if let Some(rest) = value.strip_prefix(op.as_str()) {
            if is_number(rest) {
                return Ok((op, rest));
            }
        }
    }

    Ok((CompareOp::Eq, value))
}

fn is_number(raw: &str) -> bool {
    let digits = raw.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(raw);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}

fn build_operand(field: &str, op: CompareOp, raw: &str) -> Result<Operand, QueryError> {
    match op {
        CompareOp::In => {
            let values = split_list(raw);
            if values.is_empty() {
                return Err(QueryError::malformed(format!(
                    "Empty 'in' list in filter on '{}'",
                    field
                )));
            }
            Ok(Operand::List(values))
        }
        CompareOp::Eq => Ok(Operand::Single(raw.to_string())),
        _ => {
            let value = raw.trim();
            if value.is_empty() {
                return Err(QueryError::malformed(format!(
                    "Missing value for '{}' in filter on '{}'",
                    op.as_str(),
                    field
                )));
            }
            Ok(Operand::Single(value.to_string()))
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn window_always_within_bounds(page in ".{0,8}", limit in ".{0,8}") {
            let limits = PaginationConfig::default();
            let query = ListQuery::from_pairs([("page", page), ("limit", limit)], &limits).unwrap();
            prop_assert!(query.window.page >= 1);
            prop_assert!(query.window.limit >= 1);
            prop_assert!(query.window.limit <= limits.max_limit);
        }

        #[test]
        fn plain_words_are_equality(field in "[a-z]{1,12}", value in "[a-zA-Z ]{0,16}") {
            prop_assume!(!["select", "sort", "page", "limit"].contains(&field.as_str()));
            let query = ListQuery::from_pairs([(field.clone(), value.clone())], &PaginationConfig::default()).unwrap();
            prop_assert_eq!(query.filter.len(), 1);
            prop_assert_eq!(query.filter[0].op, CompareOp::Eq);
            prop_assert_eq!(&query.filter[0].operand, &Operand::Single(value));
        }

        #[test]
        fn numeric_prefix_roundtrip(n in -100_000i64..100_000) {
            for op in [CompareOp::Gt, CompareOp::Gte, CompareOp::Lt, CompareOp::Lte] {
                let raw = format!("{}{}", op.as_str(), n);
                let query = ListQuery::from_pairs([("price", raw)], &PaginationConfig::default()).unwrap();
                prop_assert_eq!(query.filter[0].op, op);
                prop_assert_eq!(&query.filter[0].operand, &Operand::Single(n.to_string()));
            }
        }

        #[test]
        fn never_panics(key in ".{0,12}", value in ".{0,24}") {
            let _ = ListQuery::from_pairs([(key, value)], &PaginationConfig::default());
        }
    }
}
