/// Slice joins
///
/// A `Join` holds one flattened row per slice, assembled across a
/// cake -> layer -> component reference tree. Rows are keyed by slice id and
/// carry a content hash over their effective column values.
///
/// A join is an editing session: `filter`, `select` and `set_value` append a
/// step to the process log, each step holding an immutable snapshot of the
/// data it produced. `insert` serializes the staged values back into the
/// nested cake/layer/component insert objects the store understands.

use crate::column_selection::ColumnSelection;
use crate::edit::SetValue;
use crate::error::{Error, Result};
use crate::filter::RowFilter;
use crate::filter_processor::RowFilterProcessor;
use crate::hash::hash_row;
use crate::route::Route;
use crate::value::Value;
use crate::view::{validate_selection, View, ViewWithData};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Stable identity of one logical row across layers and components.
pub type SliceId = String;

/// One column of a slice row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinColumn {
    pub route: Route,
    /// Last committed value.
    pub value: Value,
    /// Staged value, `None` while unedited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<Value>,
}

impl JoinColumn {
    pub fn new(route: Route, value: Value) -> Self {
        JoinColumn {
            route,
            value,
            insert: None,
        }
    }

    /// The staged value if there is one, the committed value otherwise.
    pub fn effective_value(&self) -> &Value {
        self.insert.as_ref().unwrap_or(&self.value)
    }

    pub fn is_changed(&self) -> bool {
        self.insert.is_some()
    }
}

pub type JoinRow = Vec<JoinColumn>;

pub type JoinRows = BTreeMap<SliceId, JoinRow>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRowHashed {
    pub row_hash: String,
    pub columns: JoinRow,
}

impl JoinRowHashed {
    pub fn new(columns: JoinRow) -> Self {
        JoinRowHashed {
            row_hash: row_hash(&columns),
            columns,
        }
    }
}

pub type JoinRowsHashed = BTreeMap<SliceId, JoinRowHashed>;

fn row_hash(columns: &[JoinColumn]) -> String {
    let values: Vec<Value> = columns.iter().map(|c| c.effective_value().clone()).collect();
    hash_row(&values)
}

/// What a process step did.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinProcessKind {
    Filter(RowFilter),
    SetValue(SetValue),
    Select(Arc<ColumnSelection>),
}

/// One entry of the process log: the operation and the state it produced.
#[derive(Debug, Clone)]
pub struct JoinProcess {
    pub kind: JoinProcessKind,
    pub data: Arc<JoinRowsHashed>,
    pub column_selection: Arc<ColumnSelection>,
}

/// A write for the store: the cake route and the nested insert object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertCommand {
    pub route: String,
    pub value: Value,
}

/// Slice-keyed rows with a transformation log and a write path.
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Join, Route};
/// use sliceview::edit::SetValue;
/// use sliceview::join::{JoinColumn, JoinRows};
/// use serde_json::json;
///
/// let color = Route::from_flat("/carCake/colorLayer/colorComp/color").unwrap();
/// let selection = ColumnSelection::from_routes(&[color.clone()]).unwrap();
///
/// let mut rows = JoinRows::new();
/// rows.insert("car1".to_string(), vec![JoinColumn::new(color.clone(), json!("red"))]);
/// rows.insert("car2".to_string(), vec![JoinColumn::new(color, json!("blue"))]);
///
/// let mut join = Join::new(rows, selection).unwrap();
/// join.set_value(SetValue::new("/carCake/colorLayer/colorComp/color", json!("green"))).unwrap();
///
/// let commands = join.insert().unwrap();
/// assert_eq!(commands[0].route, "/carCake");
/// assert_eq!(
///     commands[0].value["/carCake/colorLayer"]["car1"]["color"],
///     json!("green")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Join {
    base: Arc<JoinRowsHashed>,
    base_column_selection: Arc<ColumnSelection>,
    processes: Vec<JoinProcess>,
}

impl Join {
    /// Fails with [`Error::ColumnNotFound`] when a slice carries a column
    /// whose route (ignoring refs) is not part of the selection.
    pub fn new(base_rows: JoinRows, base_column_selection: impl Into<Arc<ColumnSelection>>) -> Result<Self> {
        let base_column_selection = base_column_selection.into();
        let selected = base_column_selection.parsed_routes();
        if let Some(column) = base_rows
            .values()
            .flatten()
            .find(|column| !selected.iter().any(|route| route.equals_without_refs(&column.route)))
        {
            return Err(Error::ColumnNotFound {
                key: column.route.flat(),
                available: base_column_selection.routes().to_vec(),
            });
        }

        let base: JoinRowsHashed = base_rows
            .into_iter()
            .map(|(slice, columns)| (slice, JoinRowHashed::new(columns)))
            .collect();

        Ok(Join {
            base: Arc::new(base),
            base_column_selection,
            processes: Vec::new(),
        })
    }

    /// Current data: the last step's snapshot, or the base rows.
    pub fn data(&self) -> &Arc<JoinRowsHashed> {
        self.processes.last().map(|p| &p.data).unwrap_or(&self.base)
    }

    pub fn column_selection(&self) -> &Arc<ColumnSelection> {
        self.processes
            .last()
            .map(|p| &p.column_selection)
            .unwrap_or(&self.base_column_selection)
    }

    pub fn processes(&self) -> &[JoinProcess] {
        &self.processes
    }

    pub fn slice_ids(&self) -> Vec<SliceId> {
        self.data().keys().cloned().collect()
    }

    pub fn row_hashes(&self) -> Vec<String> {
        self.data().values().map(|row| row.row_hash.clone()).collect()
    }

    /// Dense rows in slice order, one cell per selected column. Columns a
    /// slice does not carry read as null.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let keys: Vec<String> = self
            .column_selection()
            .parsed_routes()
            .iter()
            .map(Route::flat_without_refs)
            .collect();

        self.data()
            .values()
            .map(|row| {
                let by_route: HashMap<String, &Value> = row
                    .columns
                    .iter()
                    .map(|c| (c.route.flat_without_refs(), c.effective_value()))
                    .collect();
                keys.iter()
                    .map(|key| by_route.get(key).map(|v| (*v).clone()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }

    /// The current snapshot as a view. Row hashes are the join's own.
    pub fn view(&self) -> Result<ViewWithData> {
        ViewWithData::with_hashes(self.column_selection().clone(), self.rows(), self.row_hashes())
    }

    /// Keep only the slices whose rows pass `filter`.
    pub fn filter(&mut self, filter: &RowFilter) -> Result<&mut Self> {
        let view = self.view()?;
        let indices = RowFilterProcessor::from_model(filter).apply_to(&view)?;
        let surviving: HashSet<&str> = indices.iter().map(|&i| view.row_hashes()[i].as_str()).collect();

        let data: JoinRowsHashed = self
            .data()
            .iter()
            .filter(|(_, row)| surviving.contains(row.row_hash.as_str()))
            .map(|(slice, row)| (slice.clone(), row.clone()))
            .collect();

        log::debug!("join filter kept {} of {} slices", data.len(), self.data().len());
        self.push(JoinProcessKind::Filter(filter.clone()), data, self.column_selection().clone());
        Ok(self)
    }

    /// Project the join onto a subset of its columns.
    pub fn select(&mut self, column_selection: impl Into<Arc<ColumnSelection>>) -> Result<&mut Self> {
        let column_selection = column_selection.into();
        validate_selection(self.column_selection(), &column_selection)?;

        let keep: HashSet<String> = column_selection
            .parsed_routes()
            .iter()
            .map(Route::flat_without_refs)
            .collect();

        let data: JoinRowsHashed = self
            .data()
            .iter()
            .map(|(slice, row)| {
                let columns: JoinRow = row
                    .columns
                    .iter()
                    .filter(|c| keep.contains(&c.route.flat_without_refs()))
                    .cloned()
                    .collect();
                (slice.clone(), JoinRowHashed::new(columns))
            })
            .collect();

        self.push(JoinProcessKind::Select(column_selection.clone()), data, column_selection);
        Ok(self)
    }

    /// Stage `set_value.value` into every column addressing `set_value.route`,
    /// in every slice.
    pub fn set_value(&mut self, set_value: SetValue) -> Result<&mut Self> {
        let target = Route::from_flat(&set_value.route)?;
        let selection = self.column_selection().clone();
        if !selection
            .parsed_routes()
            .iter()
            .any(|route| route.equals_without_refs(&target))
        {
            return Err(Error::ColumnNotFound {
                key: set_value.route.clone(),
                available: selection.routes().to_vec(),
            });
        }

        let mut staged = 0;
        let data: JoinRowsHashed = self
            .data()
            .iter()
            .map(|(slice, row)| {
                if !row.columns.iter().any(|c| c.route.equals_without_refs(&target)) {
                    return (slice.clone(), row.clone());
                }
                staged += 1;
                let columns: JoinRow = row
                    .columns
                    .iter()
                    .map(|c| {
                        let mut column = c.clone();
                        if column.route.equals_without_refs(&target) {
                            column.insert = Some(set_value.value.clone());
                        }
                        column
                    })
                    .collect();
                (slice.clone(), JoinRowHashed::new(columns))
            })
            .collect();

        log::debug!("join staged {} into {} slices", set_value.route, staged);
        self.push(JoinProcessKind::SetValue(set_value), data, selection);
        Ok(self)
    }

    /// Apply several `set_value` steps. Either all of them land or none do.
    pub fn set_values(&mut self, set_values: Vec<SetValue>) -> Result<&mut Self> {
        let mut next = self.clone();
        for set_value in set_values {
            next.set_value(set_value)?;
        }
        *self = next;
        Ok(self)
    }

    fn push(&mut self, kind: JoinProcessKind, data: JoinRowsHashed, column_selection: Arc<ColumnSelection>) {
        self.processes.push(JoinProcess {
            kind,
            data: Arc::new(data),
            column_selection,
        });
    }

    /// Distinct component routes (column routes without their column).
    pub fn component_routes(&self) -> Vec<Route> {
        unique(self.column_selection().parsed_routes().iter().map(|r| r.without_refs().upper(1)))
    }

    /// Distinct layer routes (`/cake/layer`).
    pub fn layer_routes(&self) -> Vec<Route> {
        unique(self.column_selection().parsed_routes().iter().map(|r| r.without_refs().truncate(2)))
    }

    /// The single cake all layers hang off.
    pub fn cake_route(&self) -> Result<Route> {
        let cakes = unique(self.layer_routes().iter().map(|r| r.upper(1)));
        match cakes.as_slice() {
            [cake] => Ok(cake.clone()),
            _ => Err(Error::AmbiguousCakeRoot {
                roots: cakes.iter().map(Route::flat).collect(),
            }),
        }
    }

    /// Serialize staged values into insert commands.
    ///
    /// The command value maps each changed layer route to an object of
    /// slice -> component value. A component whose columns carry no staged
    /// value (nested components included) is written as `null`, meaning the
    /// existing component row is reused. Layers without any staged value are
    /// left out, and a join with nothing staged yields no command at all.
    pub fn insert(&self) -> Result<Vec<InsertCommand>> {
        let cake = self.cake_route()?;
        let mut cake_object = Map::new();

        for layer in self.layer_routes() {
            let components = unique(
                self.column_selection()
                    .parsed_routes()
                    .iter()
                    .filter(|r| r.includes(&layer))
                    .map(|r| r.without_refs().truncate(3)),
            );
            if components.len() > 1 {
                return Err(Error::AmbiguousComponent {
                    layer: layer.flat(),
                    components: components.iter().map(Route::flat).collect(),
                });
            }
            let Some(component) = components.first() else {
                continue;
            };

            let mut layer_object = Map::new();
            let mut layer_changed = false;
            for (slice, row) in self.data().iter() {
                let columns: Vec<(Vec<String>, &JoinColumn)> = row
                    .columns
                    .iter()
                    .filter(|c| c.route.includes(component) && c.route.depth() > component.depth())
                    .map(|c| (relative_keys(&c.route, component.depth()), c))
                    .collect();
                let value = component_object(&columns);
                layer_changed |= !value.is_null();
                layer_object.insert(slice.clone(), value);
            }

            if layer_changed {
                cake_object.insert(layer.flat(), Value::Object(layer_object));
            }
        }

        if cake_object.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![InsertCommand {
            route: cake.flat(),
            value: Value::Object(cake_object),
        }])
    }
}

fn unique(routes: impl Iterator<Item = Route>) -> Vec<Route> {
    let mut seen = HashSet::new();
    routes.filter(|r| seen.insert(r.flat())).collect()
}

fn relative_keys(route: &Route, depth: usize) -> Vec<String> {
    route
        .deeper(depth)
        .segments()
        .iter()
        .map(|s| s.table_key().to_string())
        .collect()
}

/// Build a component object from columns given by their key path below the
/// component. Returns null when nothing below is staged.
fn component_object(columns: &[(Vec<String>, &JoinColumn)]) -> Value {
    if !columns.iter().any(|(_, c)| c.is_changed()) {
        return Value::Null;
    }

    let mut object = Map::new();
    let mut nested: BTreeMap<&str, Vec<(Vec<String>, &JoinColumn)>> = BTreeMap::new();
    for (keys, column) in columns {
        match keys.as_slice() {
            [key] => {
                object.insert(key.clone(), column.effective_value().clone());
            }
            [key, ..] => nested
                .entry(key.as_str())
                .or_default()
                .push((keys[1..].to_vec(), *column)),
            [] => {}
        }
    }
    for (key, children) in nested {
        object.insert(key.to_string(), component_object(&children));
    }

    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnFilter, StringOperator};
    use serde_json::json;

    fn route(flat: &str) -> Route {
        Route::from_flat(flat).unwrap()
    }

    const BRAND: &str = "/carCake/baseLayer/baseComp/brand";
    const DOORS: &str = "/carCake/baseLayer/baseComp/doors";
    const COLOR: &str = "/carCake/paintLayer/paintComp/color";

    fn join() -> Join {
        let selection = ColumnSelection::from_routes(&[route(BRAND), route(DOORS), route(COLOR)]).unwrap();
        let mut rows = JoinRows::new();
        for (slice, brand, doors, color) in [
            ("s1", "VW", 4, "red"),
            ("s2", "BMW", 2, "blue"),
            ("s3", "Volvo", 5, "red"),
        ] {
            rows.insert(
                slice.to_string(),
                vec![
                    JoinColumn::new(route(BRAND), json!(brand)),
                    JoinColumn::new(route(DOORS), json!(doors)),
                    JoinColumn::new(route(COLOR), json!(color)),
                ],
            );
        }
        Join::new(rows, selection).unwrap()
    }

    #[test]
    fn test_rows_and_hashes() {
        let join = join();
        assert_eq!(join.slice_ids(), vec!["s1", "s2", "s3"]);
        assert_eq!(join.rows()[1], vec![json!("BMW"), json!(2), json!("blue")]);
        assert_eq!(join.row_hashes()[1], hash_row(&[json!("BMW"), json!(2), json!("blue")]));

        let view = join.view().unwrap();
        assert_eq!(view.row_count(), 3);
        assert_eq!(**view.row_hashes(), join.row_hashes());
    }

    #[test]
    fn test_missing_columns_read_as_null() {
        let selection = ColumnSelection::from_routes(&[route(BRAND), route(COLOR)]).unwrap();
        let mut rows = JoinRows::new();
        rows.insert("s1".to_string(), vec![JoinColumn::new(route(COLOR), json!("red"))]);
        let join = Join::new(rows, selection).unwrap();
        assert_eq!(join.rows(), vec![vec![json!(null), json!("red")]]);
    }

    #[test]
    fn test_filter_keeps_matching_slices_and_logs_step() {
        let mut join = join();
        join.filter(&RowFilter::and(vec![ColumnFilter::string(COLOR, StringOperator::Equals, "red")]))
            .unwrap();

        assert_eq!(join.slice_ids(), vec!["s1", "s3"]);
        assert_eq!(join.processes().len(), 1);
        assert!(matches!(join.processes()[0].kind, JoinProcessKind::Filter(_)));
        assert_eq!(join.data().len(), 2);
    }

    #[test]
    fn test_set_value_stages_and_rehashes() {
        let mut join = join();
        let before = join.row_hashes();
        join.set_value(SetValue::new(COLOR, json!("green"))).unwrap();

        let row = &join.data()["s2"];
        assert_eq!(row.columns[2].value, json!("blue"));
        assert_eq!(row.columns[2].insert, Some(json!("green")));
        assert_ne!(join.row_hashes()[1], before[1]);
        assert_eq!(join.rows()[1][2], json!("green"));

        // The base snapshot is untouched
        assert_eq!(join.processes().len(), 1);
        assert!(join.base["s2"].columns[2].insert.is_none());
    }

    #[test]
    fn test_set_value_ignores_refs() {
        let selection = ColumnSelection::from_routes(&[route(COLOR)]).unwrap();
        let mut rows = JoinRows::new();
        rows.insert(
            "s1".to_string(),
            vec![JoinColumn::new(route("/carCake/paintLayer@abc/paintComp/color"), json!("red"))],
        );
        let mut join = Join::new(rows, selection).unwrap();
        join.set_value(SetValue::new(COLOR, json!("black"))).unwrap();
        assert_eq!(join.rows()[0][0], json!("black"));
    }

    #[test]
    fn test_new_rejects_unselected_column() {
        let selection = ColumnSelection::from_routes(&[route(BRAND)]).unwrap();
        let mut rows = JoinRows::new();
        rows.insert(
            "s1".to_string(),
            vec![
                JoinColumn::new(route("/carCake/baseLayer@l1/baseComp@c1/brand"), json!("VW")),
                JoinColumn::new(route(COLOR), json!("red")),
            ],
        );
        match Join::new(rows, selection).unwrap_err() {
            Error::ColumnNotFound { key, available } => {
                assert_eq!(key, COLOR);
                assert_eq!(available, vec![BRAND.to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_set_value_unknown_route() {
        let mut join = join();
        let err = join.set_value(SetValue::new("/carCake/baseLayer/baseComp/wheels", json!(4))).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
        assert!(join.processes().is_empty());
    }

    #[test]
    fn test_set_values_is_atomic() {
        let mut join = join();
        let result = join.set_values(vec![
            SetValue::new(COLOR, json!("green")),
            SetValue::new("/carCake/nope/nope/nope", json!(1)),
        ]);
        assert!(result.is_err());
        assert!(join.processes().is_empty());

        join.set_values(vec![SetValue::new(COLOR, json!("green")), SetValue::new(DOORS, json!(3))])
            .unwrap();
        assert_eq!(join.processes().len(), 2);
        assert_eq!(join.rows()[0], vec![json!("VW"), json!(3), json!("green")]);
    }

    #[test]
    fn test_select_projects_columns() {
        let mut join = join();
        let selection = ColumnSelection::from_routes(&[route(COLOR)]).unwrap();
        join.select(selection).unwrap();
        assert_eq!(join.rows(), vec![vec![json!("red")], vec![json!("blue")], vec![json!("red")]]);
        assert_eq!(join.column_selection().count(), 1);

        let wider = ColumnSelection::from_routes(&[route(COLOR), route(BRAND)]).unwrap();
        assert!(matches!(join.select(wider), Err(Error::MissingColumns { .. })));
    }

    #[test]
    fn test_derived_routes() {
        let join = join();
        let flat = |routes: Vec<Route>| routes.iter().map(Route::flat).collect::<Vec<_>>();
        assert_eq!(
            flat(join.component_routes()),
            vec!["/carCake/baseLayer/baseComp", "/carCake/paintLayer/paintComp"]
        );
        assert_eq!(flat(join.layer_routes()), vec!["/carCake/baseLayer", "/carCake/paintLayer"]);
        assert_eq!(join.cake_route().unwrap().flat(), "/carCake");
    }

    #[test]
    fn test_two_cakes_are_ambiguous() {
        let selection = ColumnSelection::from_routes(&[route(BRAND), route("/boatCake/hullLayer/hullComp/length")])
            .unwrap();
        let join = Join::new(JoinRows::new(), selection).unwrap();
        assert!(matches!(join.cake_route(), Err(Error::AmbiguousCakeRoot { .. })));
        assert!(join.insert().is_err());
    }

    #[test]
    fn test_insert_nothing_staged() {
        assert!(join().insert().unwrap().is_empty());
    }

    #[test]
    fn test_insert_only_changed_components() {
        let mut join = join();
        join.filter(&RowFilter::and(vec![ColumnFilter::string(BRAND, StringOperator::StartsWith, "v")]))
            .unwrap()
            .set_value(SetValue::new(DOORS, json!(3)))
            .unwrap();

        let commands = join.insert().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].route, "/carCake");
        assert_eq!(
            commands[0].value,
            json!({
                "/carCake/baseLayer": {
                    "s1": {"brand": "VW", "doors": 3},
                    "s3": {"brand": "Volvo", "doors": 3}
                }
            })
        );
    }

    #[test]
    fn test_insert_same_value_still_counts_as_change() {
        let mut join = join();
        join.set_value(SetValue::new(COLOR, json!("red"))).unwrap();
        let commands = join.insert().unwrap();
        let layer = &commands[0].value["/carCake/paintLayer"];
        assert_eq!(layer["s1"], json!({"color": "red"}));
        assert_eq!(layer["s2"], json!({"color": "red"}));
    }

    #[test]
    fn test_insert_nested_component() {
        let engine = "/carCake/baseLayer/baseComp/engine/power";
        let selection = ColumnSelection::from_routes(&[route(BRAND), route(engine)]).unwrap();
        let mut rows = JoinRows::new();
        rows.insert(
            "s1".to_string(),
            vec![
                JoinColumn::new(route(BRAND), json!("VW")),
                JoinColumn::new(route(engine), json!(90)),
            ],
        );
        let mut join = Join::new(rows.clone(), selection.clone()).unwrap();
        join.set_value(SetValue::new(BRAND, json!("Audi"))).unwrap();
        let commands = join.insert().unwrap();
        assert_eq!(
            commands[0].value["/carCake/baseLayer"]["s1"],
            json!({"brand": "Audi", "engine": null})
        );

        let mut join = Join::new(rows, selection).unwrap();
        join.set_value(SetValue::new(engine, json!(110))).unwrap();
        let commands = join.insert().unwrap();
        assert_eq!(
            commands[0].value["/carCake/baseLayer"]["s1"],
            json!({"brand": "VW", "engine": {"power": 110}})
        );
    }

    #[test]
    fn test_layer_with_two_components_is_ambiguous() {
        let selection = ColumnSelection::from_routes(&[
            route(BRAND),
            route("/carCake/baseLayer/otherComp/weight"),
        ])
        .unwrap();
        let mut rows = JoinRows::new();
        rows.insert("s1".to_string(), vec![JoinColumn::new(route(BRAND), json!("VW"))]);
        let join = Join::new(rows, selection).unwrap();
        assert!(matches!(join.insert(), Err(Error::AmbiguousComponent { .. })));
    }

    #[test]
    fn test_join_column_serde() {
        let column = JoinColumn::new(route(COLOR), json!("red"));
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json, json!({"route": COLOR, "value": "red"}));
        let back: JoinColumn = serde_json::from_value(json).unwrap();
        assert_eq!(back, column);
    }
}
