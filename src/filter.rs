/// Row filter models
///
/// The serializable description of a row filter: a boolean operator and a
/// list of typed per-column filters. Evaluation lives in
/// `filter_processor`.
///
/// ```
/// use sliceview::filter::{ColumnFilter, FilterOperator, RowFilter};
///
/// let json = r#"{
///     "operator": "and",
///     "columnFilters": [
///         {"type": "number", "column": "/t/a", "operator": "greaterThan", "search": 1},
///         {"type": "string", "column": "/t/b", "operator": "endsWith", "search": "o"}
///     ]
/// }"#;
/// let filter: RowFilter = serde_json::from_str(json).unwrap();
/// assert_eq!(filter.operator, FilterOperator::And);
/// assert_eq!(filter.column_filters[1].column(), "/t/b");
/// ```

use serde::{Deserialize, Serialize};

/// How the column filters of a row filter are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StringOperator {
    Equals,
    NotEquals,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Contains,
    NotContains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BooleanOperator {
    Equals,
    NotEquals,
}

/// A filter on a single column, typed by the kind of value it compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnFilter {
    String {
        column: String,
        operator: StringOperator,
        search: String,
        #[serde(rename = "matchCase", default)]
        match_case: bool,
    },
    Number {
        column: String,
        operator: NumberOperator,
        search: f64,
    },
    Boolean {
        column: String,
        operator: BooleanOperator,
        search: bool,
    },
}

impl ColumnFilter {
    /// A case-insensitive string filter.
    pub fn string(column: impl Into<String>, operator: StringOperator, search: impl Into<String>) -> Self {
        ColumnFilter::String {
            column: column.into(),
            operator,
            search: search.into(),
            match_case: false,
        }
    }

    pub fn number(column: impl Into<String>, operator: NumberOperator, search: f64) -> Self {
        ColumnFilter::Number {
            column: column.into(),
            operator,
            search,
        }
    }

    pub fn boolean(column: impl Into<String>, operator: BooleanOperator, search: bool) -> Self {
        ColumnFilter::Boolean {
            column: column.into(),
            operator,
            search,
        }
    }

    /// Route, alias or route hash of the filtered column.
    pub fn column(&self) -> &str {
        match self {
            ColumnFilter::String { column, .. }
            | ColumnFilter::Number { column, .. }
            | ColumnFilter::Boolean { column, .. } => column,
        }
    }
}

/// Column filters combined under one boolean operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFilter {
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub column_filters: Vec<ColumnFilter>,
}

impl RowFilter {
    pub fn new(operator: FilterOperator, column_filters: Vec<ColumnFilter>) -> Self {
        RowFilter {
            operator,
            column_filters,
        }
    }

    pub fn and(column_filters: Vec<ColumnFilter>) -> Self {
        Self::new(FilterOperator::And, column_filters)
    }

    pub fn or(column_filters: Vec<ColumnFilter>) -> Self {
        Self::new(FilterOperator::Or, column_filters)
    }

    /// A filter that keeps every row.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.column_filters.is_empty()
    }
}
