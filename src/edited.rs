/// Edited views
///
/// `ViewEdited` applies a single `Edit` to a master view. `ViewEditedMultiple`
/// replays a whole chain of edits, reusing every prefix of the chain it finds
/// in a `ViewCache` so that appending one edit costs one `ViewEdited`.

use crate::cache::{CacheKey, ViewCache};
use crate::column_selection::ColumnSelection;
use crate::edit::{Edit, MultiEditResolved};
use crate::error::{Error, Result};
use crate::filter_processor::RowFilterProcessor;
use crate::hash::hash_row;
use crate::value::Value;
use crate::view::{Row, View, ViewCore};
use serde_json::Map;
use std::sync::Arc;

/// Where an edit action writes: a column, plus an optional key path into the
/// JSON object stored in that column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTarget {
    pub column: usize,
    pub path: Vec<String>,
}

/// Resolve an action route against a selection.
///
/// A route that names a column (by route, alias or route hash) targets the
/// whole cell. Otherwise the longest dotted prefix naming a column is used and
/// the rest becomes a key path: `json.done` writes `done` inside column `json`.
pub fn resolve_action_target(selection: &ColumnSelection, route: &str) -> Result<ActionTarget> {
    if let Some(column) = selection.try_column_index(route) {
        return Ok(ActionTarget {
            column,
            path: Vec::new(),
        });
    }

    for (pos, _) in route.rmatch_indices('.') {
        let (prefix, rest) = (&route[..pos], &route[pos + 1..]);
        if let Some(column) = selection.try_column_index(prefix) {
            if rest.split('.').all(|key| !key.is_empty()) {
                return Ok(ActionTarget {
                    column,
                    path: rest.split('.').map(str::to_string).collect(),
                });
            }
        }
    }

    Err(Error::ColumnNotFound {
        key: route.to_string(),
        available: selection.routes().to_vec(),
    })
}

fn set_path(cell: &mut Value, path: &[String], value: &Value) {
    let Some((key, rest)) = path.split_first() else {
        *cell = value.clone();
        return;
    };
    if !cell.is_object() {
        *cell = Value::Object(Map::new());
    }
    if let Value::Object(map) = cell {
        let child = map.entry(key.clone()).or_insert(Value::Null);
        set_path(child, rest, value);
    }
}

/// A master view with one edit applied.
///
/// Rows matched by the edit's filter get the action values written into
/// them and their hashes recomputed; every other row (and its hash) is
/// shared with the master. An edit that matches nothing, or has no actions,
/// shares the master's row matrix as a whole.
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Route, View, ViewEdited, ViewWithData};
/// use sliceview::edit::{Edit, EditAction};
/// use sliceview::filter::{ColumnFilter, RowFilter, StringOperator};
/// use serde_json::json;
///
/// let selection = ColumnSelection::from_routes(&[
///     Route::from_flat("/t/name").unwrap(),
///     Route::from_flat("/t/done").unwrap(),
/// ]).unwrap();
/// let view = ViewWithData::new(selection, vec![
///     vec![json!("a"), json!(false)],
///     vec![json!("b"), json!(false)],
/// ]).unwrap();
///
/// let edit = Edit::new(
///     "finish b",
///     RowFilter::and(vec![ColumnFilter::string("/t/name", StringOperator::Equals, "b")]),
///     vec![EditAction::new("/t/done", json!(true))],
/// );
/// let edited = ViewEdited::new(&view, &edit).unwrap();
/// assert_eq!(edited.rows()[1][1], json!(true));
/// assert_eq!(edited.row_hashes()[0], view.row_hashes()[0]);
/// ```
#[derive(Debug, Clone)]
pub struct ViewEdited {
    core: ViewCore,
    edited_rows: usize,
}

impl ViewEdited {
    pub fn new(master: &dyn View, edit: &Edit) -> Result<Self> {
        let selection = master.column_selection();
        let targets: Vec<(ActionTarget, &Value)> = edit
            .actions
            .iter()
            .map(|action| Ok((resolve_action_target(selection, &action.route)?, &action.set_value)))
            .collect::<Result<_>>()?;

        let matched = RowFilterProcessor::from_model(&edit.filter).apply_to(master)?;

        if targets.is_empty() || matched.is_empty() {
            return Ok(ViewEdited {
                core: master.core().clone(),
                edited_rows: 0,
            });
        }

        let mut rows: Vec<Row> = (**master.rows()).clone();
        let mut row_hashes: Vec<String> = (**master.row_hashes()).clone();

        for &index in matched.iter() {
            let mut cells = rows[index].to_vec();
            for (target, value) in &targets {
                set_path(&mut cells[target.column], &target.path, value);
            }
            row_hashes[index] = hash_row(&cells);
            rows[index] = Row::from(cells);
        }

        log::trace!("edit '{}' changed {} rows", edit.name, matched.len());

        Ok(ViewEdited {
            core: ViewCore::from_checked_with_hashes(
                selection.clone(),
                Arc::new(rows),
                master.core().column_types().clone(),
                Arc::new(row_hashes),
            ),
            edited_rows: matched.len(),
        })
    }

    /// Number of rows the edit wrote to.
    pub fn edited_row_count(&self) -> usize {
        self.edited_rows
    }
}

impl View for ViewEdited {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}

/// A master view with a chain of edits replayed on it.
///
/// Walking back from the head, the first node whose result is cached for
/// this master becomes the starting point; only the nodes after it are
/// replayed, and each freshly computed step is cached.
#[derive(Debug, Clone)]
pub struct ViewEditedMultiple {
    core: ViewCore,
    edits_applied: usize,
}

impl ViewEditedMultiple {
    pub fn new(master: Arc<dyn View>, multi_edit: &Arc<MultiEditResolved>, cache: &ViewCache) -> Result<Self> {
        if multi_edit.is_empty() {
            return Ok(ViewEditedMultiple {
                core: master.core().clone(),
                edits_applied: 0,
            });
        }

        let master_hash = master.hash().to_string();

        let mut pending: Vec<Arc<MultiEditResolved>> = Vec::new();
        let mut start: Option<Arc<dyn View>> = None;
        let mut cursor = Some(multi_edit.clone());
        while let Some(node) = cursor {
            if let Some(hit) = cache.get(&CacheKey::new(master_hash.as_str(), node.hash())) {
                log::debug!("edit chain cache hit at {} ({} steps to replay)", node.hash(), pending.len());
                start = Some(hit);
                break;
            }
            cursor = node.previous().cloned();
            pending.push(node);
        }

        let mut current = start.unwrap_or(master);
        let mut edits_applied = 0;

        for node in pending.into_iter().rev() {
            let key = CacheKey::new(master_hash.as_str(), node.hash());
            current = match cache.get(&key) {
                Some(view) => view,
                None => {
                    let view: Arc<dyn View> = Arc::new(ViewEdited::new(current.as_ref(), node.edit())?);
                    edits_applied += 1;
                    cache.set(key, view.clone());
                    view
                }
            };
        }

        Ok(ViewEditedMultiple {
            core: current.core().clone(),
            edits_applied,
        })
    }

    /// How many `ViewEdited` steps this replay computed.
    pub fn edits_applied(&self) -> usize {
        self.edits_applied
    }
}

impl View for ViewEditedMultiple {
    fn core(&self) -> &ViewCore {
        &self.core
    }
}
