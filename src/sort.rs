/// Row sorting
///
/// A `RowSort` is an ordered list of (route, direction) pairs. Routes are
/// parsed and hashed once at construction; `apply_to` resolves them against a
/// view and returns a stable permutation of its row indices.

use crate::error::{Error, Result};
use crate::hash::hash_str;
use crate::route::Route;
use crate::value::compare_values;
use crate::view::View;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first, nulls first
    #[default]
    Asc,
    /// Largest first, nulls last
    Desc,
}

/// A resolved sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub route: String,
    pub route_hash: String,
    pub direction: SortDirection,
}

/// Multi-column stable sort.
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Route, RowSort, SortDirection, ViewWithData};
/// use serde_json::json;
///
/// let selection = ColumnSelection::from_routes(&[Route::from_flat("/t/n").unwrap()]).unwrap();
/// let view = ViewWithData::new(selection, vec![vec![json!(3)], vec![json!(1)], vec![json!(2)]]).unwrap();
///
/// let sort = RowSort::new([("/t/n", SortDirection::Desc)]).unwrap();
/// assert_eq!(*sort.apply_to(&view).unwrap(), vec![0, 2, 1]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSort {
    columns: Vec<SortColumn>,
}

impl RowSort {
    /// Build a sort from (route, direction) pairs, first pair first.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, SortDirection)>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|(route, direction)| {
                let flat = Route::from_flat(route.as_ref())?.flat();
                Ok(SortColumn {
                    route_hash: hash_str(&flat),
                    route: flat,
                    direction,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowSort { columns })
    }

    /// A sort that keeps rows in their original order.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// The sorted order of the rows of `view`, as indices into its rows.
    pub fn apply_to(&self, view: &dyn View) -> Result<Arc<Vec<usize>>> {
        if view.row_count() == 0 || self.columns.is_empty() {
            return Ok(view.row_indices().clone());
        }

        let selection = view.column_selection();
        let mut keys = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();
        for column in &self.columns {
            match selection.index_of_hash(&column.route_hash) {
                Some(index) => keys.push((index, column.direction)),
                None => missing.push(column.route.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                missing,
                available: selection.routes().to_vec(),
            });
        }

        let rows = view.rows();
        let mut indices: Vec<usize> = (0..rows.len()).collect();

        // `sort_by` is stable: ties keep their original order
        indices.sort_by(|&a, &b| {
            for &(col, direction) in &keys {
                let cmp = compare_values(&rows[a][col], &rows[b][col]);
                let cmp = match direction {
                    SortDirection::Asc => cmp,
                    SortDirection::Desc => cmp.reverse(),
                };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        Ok(Arc::new(indices))
    }
}
