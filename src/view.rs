/// SliceView View Implementation
///
/// Views are immutable snapshots of "rows + column metadata + content hash".
/// Every transformation (select, filter, sort, edit) builds a new view that
/// shares whatever it did not change with its master: the row matrix, single
/// rows and row hashes are all reference counted and passed through when
/// untouched.
///
/// Row hashes, the view hash and the row index list are computed lazily and
/// memoized.

use crate::column_selection::{ColumnLookup, ColumnSelection};
use crate::error::{Error, Result};
use crate::filter::RowFilter;
use crate::filter_processor::RowFilterProcessor;
use crate::hash::{hash_row, hash_strings};
use crate::sort::RowSort;
use crate::value::{infer_column_types, ColumnType, TypeInference, Value};
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

/// One row of cells, one cell per selected column.
pub type Row = Arc<[Value]>;

/// A shared row matrix.
pub type Rows = Arc<Vec<Row>>;

/// The state every view variant carries.
#[derive(Debug, Clone)]
pub struct ViewCore {
    column_selection: Arc<ColumnSelection>,
    rows: Rows,
    column_types: Arc<Vec<ColumnType>>,
    row_hashes: OnceLock<Arc<Vec<String>>>,
    hash: OnceLock<String>,
    row_indices: OnceLock<Arc<Vec<usize>>>,
}

fn check_widths(column_selection: &ColumnSelection, rows: &[Row]) -> Result<()> {
    let expected = column_selection.count();
    match rows.iter().map(|r| r.len()).enumerate().find(|(_, len)| *len != expected) {
        Some((row, actual)) => Err(Error::RowLength {
            row,
            expected,
            actual,
        }),
        None => Ok(()),
    }
}

impl ViewCore {
    /// Build a core, checking that every row has one cell per column.
    pub fn new(
        column_selection: Arc<ColumnSelection>,
        rows: Rows,
        column_types: Arc<Vec<ColumnType>>,
    ) -> Result<Self> {
        check_widths(&column_selection, &rows)?;
        Ok(Self::from_checked(column_selection, rows, column_types))
    }

    /// Like [`ViewCore::new`] but with row hashes supplied by the caller.
    pub fn with_hashes(
        column_selection: Arc<ColumnSelection>,
        rows: Rows,
        column_types: Arc<Vec<ColumnType>>,
        row_hashes: Arc<Vec<String>>,
    ) -> Result<Self> {
        if row_hashes.len() != rows.len() {
            return Err(Error::RowHashCount {
                rows: rows.len(),
                hashes: row_hashes.len(),
            });
        }
        check_widths(&column_selection, &rows)?;
        Ok(Self::from_checked_with_hashes(column_selection, rows, column_types, row_hashes))
    }

    /// Rows already known to have the right width (derived from a checked view).
    pub(crate) fn from_checked(
        column_selection: Arc<ColumnSelection>,
        rows: Rows,
        column_types: Arc<Vec<ColumnType>>,
    ) -> Self {
        ViewCore {
            column_selection,
            rows,
            column_types,
            row_hashes: OnceLock::new(),
            hash: OnceLock::new(),
            row_indices: OnceLock::new(),
        }
    }

    pub(crate) fn from_checked_with_hashes(
        column_selection: Arc<ColumnSelection>,
        rows: Rows,
        column_types: Arc<Vec<ColumnType>>,
        row_hashes: Arc<Vec<String>>,
    ) -> Self {
        ViewCore {
            column_selection,
            rows,
            column_types,
            row_hashes: OnceLock::from(row_hashes),
            hash: OnceLock::new(),
            row_indices: OnceLock::new(),
        }
    }

    pub fn column_selection(&self) -> &Arc<ColumnSelection> {
        &self.column_selection
    }

    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    pub fn column_types(&self) -> &Arc<Vec<ColumnType>> {
        &self.column_types
    }

    pub fn row_hashes(&self) -> &Arc<Vec<String>> {
        self.row_hashes
            .get_or_init(|| Arc::new(self.rows.iter().map(|row| hash_row(row)).collect()))
    }

    /// Content hash over the column route hashes and all row hashes.
    pub fn hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut parts = Vec::with_capacity(self.rows.len() + 1);
            parts.push(self.column_selection.hash().to_string());
            parts.extend(self.row_hashes().iter().cloned());
            hash_strings(&parts)
        })
    }

    /// Identity mapping `0..row_count`.
    pub fn row_indices(&self) -> &Arc<Vec<usize>> {
        self.row_indices
            .get_or_init(|| Arc::new((0..self.rows.len()).collect()))
    }

    /// A core holding the rows at `indices` (in that order). Row content and
    /// row hashes are carried over unchanged.
    pub(crate) fn pick(&self, indices: &[usize]) -> ViewCore {
        let rows: Vec<Row> = indices.iter().map(|&i| self.rows[i].clone()).collect();
        let hashes = self.row_hashes();
        let row_hashes: Vec<String> = indices.iter().map(|&i| hashes[i].clone()).collect();
        Self::from_checked_with_hashes(
            self.column_selection.clone(),
            Arc::new(rows),
            self.column_types.clone(),
            Arc::new(row_hashes),
        )
    }
}

/// The contract every view variant fulfils.
pub trait View: Debug + Send + Sync {
    fn core(&self) -> &ViewCore;

    fn column_selection(&self) -> &Arc<ColumnSelection> {
        self.core().column_selection()
    }

    fn rows(&self) -> &Rows {
        self.core().rows()
    }

    fn row_hashes(&self) -> &Arc<Vec<String>> {
        self.core().row_hashes()
    }

    /// The view's own fingerprint.
    fn hash(&self) -> &str {
        self.core().hash()
    }

    fn row_indices(&self) -> &Arc<Vec<usize>> {
        self.core().row_indices()
    }

    fn column_types(&self) -> &[ColumnType] {
        self.core().column_types()
    }

    fn row_count(&self) -> usize {
        self.core().rows().len()
    }

    fn column_count(&self) -> usize {
        self.core().column_selection().count()
    }

    /// The cell at `row` in the given column.
    fn value(&self, row: usize, column: ColumnLookup<'_>) -> Result<&Value> {
        let col = self.column_selection().column_index(column)?;
        let rows = self.rows();
        let cells = rows.get(row).ok_or(Error::RowOutOfRange {
            row,
            len: rows.len(),
        })?;
        cells.get(col).ok_or_else(|| Error::ColumnNotFound {
            key: col.to_string(),
            available: self.column_selection().routes().to_vec(),
        })
    }
}

/// The root view: raw rows over a column selection.
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Route, View, ViewWithData};
/// use sliceview::value::ColumnType;
/// use serde_json::json;
///
/// let selection = ColumnSelection::from_routes(&[
///     Route::from_flat("/car/brand").unwrap(),
///     Route::from_flat("/car/doors").unwrap(),
/// ]).unwrap();
///
/// let view = ViewWithData::new(selection, vec![
///     vec![json!("VW"), json!(4)],
///     vec![json!("BMW"), json!(null)],
/// ]).unwrap();
///
/// assert_eq!(view.row_count(), 2);
/// assert_eq!(view.column_types(), &[ColumnType::String, ColumnType::Number]);
/// assert_eq!(view.value(0, "brand".into()).unwrap(), &json!("VW"));
/// ```
#[derive(Debug, Clone)]
pub struct ViewWithData {
    core: ViewCore,
}

impl ViewWithData {
    /// Wrap raw rows, inferring column types from the first non-null cells.
    pub fn new(column_selection: impl Into<Arc<ColumnSelection>>, rows: Vec<Vec<Value>>) -> Result<Self> {
        Self::with_inference(column_selection, rows, TypeInference::Shallow)
    }

    pub fn with_inference(
        column_selection: impl Into<Arc<ColumnSelection>>,
        rows: Vec<Vec<Value>>,
        inference: TypeInference,
    ) -> Result<Self> {
        let rows: Vec<Row> = rows.into_iter().map(Row::from).collect();
        Self::from_rows(column_selection, rows, inference)
    }

    /// Wrap rows that are already shared.
    pub fn from_rows(
        column_selection: impl Into<Arc<ColumnSelection>>,
        rows: Vec<Row>,
        inference: TypeInference,
    ) -> Result<Self> {
        let column_selection = column_selection.into();
        let types = infer_column_types(&column_selection.column_types(), &rows, inference);
        let core = ViewCore::new(column_selection, Arc::new(rows), Arc::new(types))?;
        core.row_hashes();
        Ok(ViewWithData { core })
    }

    /// Wrap rows whose hashes the caller already knows (e.g. hashes stamped
    /// by the backing store).
    pub fn with_hashes(
        column_selection: impl Into<Arc<ColumnSelection>>,
        rows: Vec<Vec<Value>>,
        row_hashes: Vec<String>,
    ) -> Result<Self> {
        let column_selection = column_selection.into();
        let rows: Vec<Row> = rows.into_iter().map(Row::from).collect();
        let types = infer_column_types(&column_selection.column_types(), &rows, TypeInference::Shallow);
        let core = ViewCore::with_hashes(
            column_selection,
            Arc::new(rows),
            Arc::new(types),
            Arc::new(row_hashes),
        )?;
        Ok(ViewWithData { core })
    }
}

impl View for ViewWithData {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}

/// A view without rows.
#[derive(Debug, Clone)]
pub struct ViewEmpty {
    core: ViewCore,
}

impl ViewEmpty {
    pub fn new(column_selection: impl Into<Arc<ColumnSelection>>) -> Self {
        let column_selection = column_selection.into();
        let types = Arc::new(column_selection.column_types());
        ViewEmpty {
            core: ViewCore::from_checked(column_selection, Arc::new(Vec::new()), types),
        }
    }
}

impl Default for ViewEmpty {
    fn default() -> Self {
        Self::new(ColumnSelection::empty())
    }
}

impl View for ViewEmpty {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}

/// Fail with the list of routes in `selection` that `master` lacks.
pub fn validate_selection(master: &ColumnSelection, selection: &ColumnSelection) -> Result<()> {
    let missing = selection.added_columns(master);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingColumns {
            missing,
            available: master.routes().to_vec(),
        })
    }
}

/// Projects the columns of a master view into a new column order.
///
/// Row order and row hashes are preserved, so projected rows still match
/// their master rows. When the selection equals the master's, the master's
/// rows are shared as well.
#[derive(Debug, Clone)]
pub struct ViewSelected {
    core: ViewCore,
}

impl ViewSelected {
    pub fn new(master: &dyn View, column_selection: impl Into<Arc<ColumnSelection>>) -> Result<Self> {
        let column_selection = column_selection.into();
        let master_selection = master.column_selection();
        validate_selection(master_selection, &column_selection)?;

        let positions: Vec<usize> = column_selection
            .route_hashes()
            .iter()
            .filter_map(|hash| master_selection.index_of_hash(hash))
            .collect();

        let master_types = master.column_types();
        let types: Vec<ColumnType> = column_selection
            .columns()
            .iter()
            .zip(&positions)
            .map(|(column, &pos)| match column.column_type {
                ColumnType::JsonValue => master_types[pos],
                declared => declared,
            })
            .collect();

        let identity = positions.len() == master_selection.count()
            && positions.iter().enumerate().all(|(i, &p)| i == p);

        let core = if identity {
            ViewCore::from_checked_with_hashes(
                column_selection,
                master.rows().clone(),
                Arc::new(types),
                master.row_hashes().clone(),
            )
        } else {
            let rows: Vec<Row> = master
                .rows()
                .iter()
                .map(|row| positions.iter().map(|&p| row[p].clone()).collect::<Row>())
                .collect();
            ViewCore::from_checked_with_hashes(
                column_selection,
                Arc::new(rows),
                Arc::new(types),
                master.row_hashes().clone(),
            )
        };

        Ok(ViewSelected { core })
    }
}

impl View for ViewSelected {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}

/// The rows of a master view that pass a row filter.
#[derive(Debug, Clone)]
pub struct ViewFiltered {
    core: ViewCore,
    indices: Arc<Vec<usize>>,
}

impl ViewFiltered {
    pub fn new(master: &dyn View, filter: &RowFilterProcessor) -> Result<Self> {
        let indices = filter.apply_to(master)?;
        let core = if Arc::ptr_eq(&indices, master.row_indices()) {
            master.core().clone()
        } else {
            master.core().pick(&indices)
        };
        Ok(ViewFiltered { core, indices })
    }

    pub fn from_model(master: &dyn View, filter: &RowFilter) -> Result<Self> {
        Self::new(master, &RowFilterProcessor::from_model(filter))
    }

    /// Indices of the surviving rows in the master view.
    pub fn master_indices(&self) -> &Arc<Vec<usize>> {
        &self.indices
    }
}

impl View for ViewFiltered {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}

/// The rows of a master view in sorted order.
#[derive(Debug, Clone)]
pub struct ViewSorted {
    core: ViewCore,
    indices: Arc<Vec<usize>>,
}

impl ViewSorted {
    pub fn new(master: &dyn View, sort: &RowSort) -> Result<Self> {
        let indices = sort.apply_to(master)?;
        let core = if Arc::ptr_eq(&indices, master.row_indices()) {
            master.core().clone()
        } else {
            master.core().pick(&indices)
        };
        Ok(ViewSorted { core, indices })
    }

    /// `master_indices()[i]` is the master row shown at position `i`.
    pub fn master_indices(&self) -> &Arc<Vec<usize>> {
        &self.indices
    }
}

impl View for ViewSorted {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}
