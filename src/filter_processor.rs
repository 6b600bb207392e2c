/// Row filter processors
///
/// A `RowFilterProcessor` compiles a `RowFilter` model into typed per-column
/// predicates and evaluates them against a view, producing the indices of the
/// matching rows.
///
/// Filters that constrain nothing return the view's own `row_indices` (the
/// same `Arc`), which lets downstream views detect that they can pass their
/// master's rows through untouched.

use crate::error::{Error, Result};
use crate::filter::{
    BooleanOperator, ColumnFilter, FilterOperator, NumberOperator, RowFilter, StringOperator,
};
use crate::value::Value;
use crate::view::View;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Compiled string filter. The search text is lowercased up front unless
/// the filter matches case.
#[derive(Debug, Clone, PartialEq)]
pub struct StringFilterProcessor {
    operator: StringOperator,
    search: String,
    match_case: bool,
}

impl StringFilterProcessor {
    pub fn new(operator: StringOperator, search: &str, match_case: bool) -> Self {
        StringFilterProcessor {
            operator,
            search: if match_case {
                search.to_string()
            } else {
                search.to_lowercase()
            },
            match_case,
        }
    }

    pub fn matches(&self, cell: &Value) -> bool {
        let text = match cell {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        let text = text.map(|t| if self.match_case { t } else { t.to_lowercase() });
        let search = self.search.as_str();

        let positive = |check: fn(&str, &str) -> bool| -> bool {
            text.as_deref().map(|t| check(t, search)).unwrap_or(false)
        };

        match self.operator {
            StringOperator::Equals => positive(|t, s| t == s),
            StringOperator::NotEquals => !positive(|t, s| t == s),
            StringOperator::StartsWith => positive(|t, s| t.starts_with(s)),
            StringOperator::NotStartsWith => !positive(|t, s| t.starts_with(s)),
            StringOperator::EndsWith => positive(|t, s| t.ends_with(s)),
            StringOperator::NotEndsWith => !positive(|t, s| t.ends_with(s)),
            StringOperator::Contains => positive(|t, s| t.contains(s)),
            StringOperator::NotContains => !positive(|t, s| t.contains(s)),
        }
    }
}

/// Compiled number filter. Numeric strings are compared by their value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFilterProcessor {
    operator: NumberOperator,
    search: f64,
}

impl NumberFilterProcessor {
    pub fn new(operator: NumberOperator, search: f64) -> Self {
        NumberFilterProcessor { operator, search }
    }

    pub fn matches(&self, cell: &Value) -> bool {
        let number = match cell {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        let Some(n) = number else {
            return self.operator == NumberOperator::NotEquals;
        };

        match self.operator {
            NumberOperator::Equals => n == self.search,
            NumberOperator::NotEquals => n != self.search,
            NumberOperator::GreaterThan => n > self.search,
            NumberOperator::GreaterThanOrEquals => n >= self.search,
            NumberOperator::LessThan => n < self.search,
            NumberOperator::LessThanOrEquals => n <= self.search,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanFilterProcessor {
    operator: BooleanOperator,
    search: bool,
}

impl BooleanFilterProcessor {
    pub fn new(operator: BooleanOperator, search: bool) -> Self {
        BooleanFilterProcessor { operator, search }
    }

    pub fn matches(&self, cell: &Value) -> bool {
        let equal = cell.as_bool() == Some(self.search);
        match self.operator {
            BooleanOperator::Equals => equal,
            BooleanOperator::NotEquals => !equal,
        }
    }
}

/// A typed predicate over one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilterProcessor {
    String(StringFilterProcessor),
    Number(NumberFilterProcessor),
    Boolean(BooleanFilterProcessor),
}

impl ColumnFilterProcessor {
    pub fn from_model(filter: &ColumnFilter) -> Self {
        match filter {
            ColumnFilter::String {
                operator,
                search,
                match_case,
                ..
            } => ColumnFilterProcessor::String(StringFilterProcessor::new(*operator, search, *match_case)),
            ColumnFilter::Number {
                operator, search, ..
            } => ColumnFilterProcessor::Number(NumberFilterProcessor::new(*operator, *search)),
            ColumnFilter::Boolean {
                operator, search, ..
            } => ColumnFilterProcessor::Boolean(BooleanFilterProcessor::new(*operator, *search)),
        }
    }

    pub fn matches(&self, cell: &Value) -> bool {
        match self {
            ColumnFilterProcessor::String(p) => p.matches(cell),
            ColumnFilterProcessor::Number(p) => p.matches(cell),
            ColumnFilterProcessor::Boolean(p) => p.matches(cell),
        }
    }
}

/// Evaluates a row filter against views.
///
/// Processors are keyed by the column they filter (a route, alias or route
/// hash, resolved against the view's column selection at evaluation time).
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Route, RowFilterProcessor, ViewWithData, View};
/// use sliceview::filter::{ColumnFilter, NumberOperator, RowFilter};
/// use serde_json::json;
///
/// let selection = ColumnSelection::from_routes(&[Route::from_flat("/t/n").unwrap()]).unwrap();
/// let view = ViewWithData::new(selection, vec![vec![json!(1)], vec![json!(5)]]).unwrap();
///
/// let filter = RowFilter::and(vec![ColumnFilter::number("/t/n", NumberOperator::GreaterThan, 2.0)]);
/// let indices = RowFilterProcessor::from_model(&filter).apply_to(&view).unwrap();
/// assert_eq!(*indices, vec![1]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowFilterProcessor {
    operator: FilterOperator,
    processors: BTreeMap<String, Vec<ColumnFilterProcessor>>,
}

impl RowFilterProcessor {
    pub fn new(operator: FilterOperator) -> Self {
        RowFilterProcessor {
            operator,
            processors: BTreeMap::new(),
        }
    }

    /// A processor that constrains nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_model(filter: &RowFilter) -> Self {
        let mut processor = Self::new(filter.operator);
        for column_filter in &filter.column_filters {
            processor.add(column_filter.column(), ColumnFilterProcessor::from_model(column_filter));
        }
        processor
    }

    /// Add a predicate for `column`.
    pub fn add(&mut self, column: impl Into<String>, processor: ColumnFilterProcessor) {
        self.processors.entry(column.into()).or_default().push(processor);
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Columns this processor filters on.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    /// Indices of the rows of `view` that pass the filter, in view order.
    pub fn apply_to(&self, view: &dyn View) -> Result<Arc<Vec<usize>>> {
        if view.row_count() == 0 {
            return Ok(view.row_indices().clone());
        }

        let selection = view.column_selection();
        let missing: Vec<String> = self
            .processors
            .keys()
            .filter(|key| selection.try_column_index(key.as_str()).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                missing,
                available: selection.routes().to_vec(),
            });
        }

        // Per column index, the predicates that apply to it
        let mut by_column: Vec<Vec<&ColumnFilterProcessor>> = vec![Vec::new(); selection.count()];
        for (key, processors) in &self.processors {
            if let Some(col) = selection.try_column_index(key.as_str()) {
                by_column[col].extend(processors.iter());
            }
        }

        if by_column.iter().all(Vec::is_empty) {
            return Ok(view.row_indices().clone());
        }

        let result = match self.operator {
            FilterOperator::And => Self::filter_and(view, &by_column),
            FilterOperator::Or => Self::filter_or(view, &by_column),
        };
        Ok(Arc::new(result))
    }

    fn filter_and(view: &dyn View, by_column: &[Vec<&ColumnFilterProcessor>]) -> Vec<usize> {
        let rows = view.rows();
        let mut candidates: Vec<usize> = (0..rows.len()).collect();

        for (col, processors) in by_column.iter().enumerate() {
            for processor in processors {
                candidates.retain(|&row| processor.matches(&rows[row][col]));
                if candidates.is_empty() {
                    return candidates;
                }
            }
        }

        candidates
    }

    // A row that matched once is never checked again.
    fn filter_or(view: &dyn View, by_column: &[Vec<&ColumnFilterProcessor>]) -> Vec<usize> {
        let rows = view.rows();
        let mut matched = vec![false; rows.len()];

        for (col, processors) in by_column.iter().enumerate() {
            for processor in processors {
                for (row, hit) in matched.iter_mut().enumerate() {
                    if !*hit {
                        *hit = processor.matches(&rows[row][col]);
                    }
                }
            }
        }

        matched
            .iter()
            .enumerate()
            .filter_map(|(row, hit)| hit.then_some(row))
            .collect()
    }
}
