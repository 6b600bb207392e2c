//! A tiny in-memory stand-in for the content-addressed store.
//!
//! Layout: one cake table whose rows map layer keys to layer row hashes; one
//! table per layer whose rows map slice ids to component row hashes; one
//! table per component holding the column values. Every row carries its
//! content hash under `_hash` and tables are append-only.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use sliceview::hash::hash_value;
use sliceview::join::{JoinColumn, JoinRows};
use sliceview::{ColumnSelection, InsertCommand, Join, Route, RouteSegment};
use std::collections::BTreeMap;

pub const CAKE: &str = "carCake";

#[derive(Debug, Default)]
pub struct Store {
    tables: BTreeMap<String, Vec<Value>>,
}

fn stamp(mut row: Map<String, Value>) -> Value {
    row.remove("_hash");
    let hash = hash_value(&Value::Object(row.clone()));
    row.insert("_hash".to_string(), json!(hash));
    Value::Object(row)
}

fn hash_of(row: &Value) -> String {
    row["_hash"].as_str().unwrap_or_default().to_string()
}

impl Store {
    /// Three cars: base data (brand, doors) and paint (color) in two layers.
    pub fn cars() -> Self {
        let mut store = Store::default();
        let cars = [("car1", "VW", 4, "red"), ("car2", "BMW", 2, "blue"), ("car3", "Volvo", 5, "red")];

        let mut base_layer = Map::new();
        let mut paint_layer = Map::new();
        for (slice, brand, doors, color) in cars {
            let base = store.add("baseComp", json!({"brand": brand, "doors": doors}));
            let paint = store.add("paintComp", json!({"color": color}));
            base_layer.insert(slice.to_string(), json!(base));
            paint_layer.insert(slice.to_string(), json!(paint));
        }

        let base = store.add("baseLayer", json!({ "components": "baseComp", "add": base_layer }));
        let paint = store.add("paintLayer", json!({ "components": "paintComp", "add": paint_layer }));
        store.add(CAKE, json!({"layers": {"baseLayer": base, "paintLayer": paint}}));
        store
    }

    /// Append a row, stamping its hash. Rows already present are not duplicated.
    pub fn add(&mut self, table: &str, row: Value) -> String {
        let row = match row {
            Value::Object(map) => stamp(map),
            other => stamp(Map::from_iter([("value".to_string(), other)])),
        };
        let hash = hash_of(&row);
        let rows = self.tables.entry(table.to_string()).or_default();
        if !rows.iter().any(|r| hash_of(r) == hash) {
            rows.push(row);
        }
        hash
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    pub fn get(&self, table: &str, hash: &str) -> Option<&Value> {
        self.tables.get(table)?.iter().find(|r| hash_of(r) == hash)
    }

    fn latest(&self, table: &str) -> Option<&Value> {
        self.tables.get(table)?.last()
    }

    /// Read the given column routes (`/carCake/<layer>/<comp>/<column>`) of
    /// the latest cake into a join. Column routes carry the concrete layer
    /// and component rows as refs.
    pub fn join(&self, routes: &[&str]) -> Join {
        let routes: Vec<Route> = routes.iter().map(|r| Route::from_flat(r).unwrap()).collect();
        let selection = ColumnSelection::from_routes(&routes).unwrap();

        let cake = self.latest(CAKE).unwrap();
        let mut rows = JoinRows::new();
        for route in &routes {
            let keys: Vec<&str> = route.segments().iter().map(|s| s.table_key()).collect();
            let (layer, component, column) = (keys[1], keys[2], keys[3]);
            let layer_hash = cake["layers"][layer].as_str().unwrap();
            let layer_row = self.get(layer, layer_hash).unwrap();

            for (slice, component_hash) in layer_row["add"].as_object().unwrap() {
                let component_hash = component_hash.as_str().unwrap();
                let component_row = self.get(component, component_hash).unwrap();
                let concrete = Route::new(vec![
                    RouteSegment::new(CAKE),
                    RouteSegment::with_ref(layer, layer_hash),
                    RouteSegment::with_ref(component, component_hash),
                    RouteSegment::new(column),
                ]);
                rows.entry(slice.clone())
                    .or_default()
                    .push(JoinColumn::new(concrete, component_row[column].clone()));
            }
        }

        Join::new(rows, selection).unwrap()
    }

    /// Execute an insert command: new component rows for changed slices, a
    /// new row per touched layer and a new cake row.
    pub fn insert(&mut self, command: &InsertCommand) {
        assert_eq!(command.route, format!("/{CAKE}"));
        let mut cake = self.latest(CAKE).unwrap().clone();

        for (layer_route, slices) in command.value.as_object().unwrap() {
            let layer = Route::from_flat(layer_route).unwrap().leaf().table_key().to_string();
            let layer_hash = cake["layers"][layer.as_str()].as_str().unwrap().to_string();
            let mut layer_row = self.get(&layer, &layer_hash).unwrap().clone();
            let component = layer_row["components"].as_str().unwrap().to_string();

            for (slice, value) in slices.as_object().unwrap() {
                let Value::Object(changes) = value else {
                    continue;
                };
                let current_hash = layer_row["add"][slice.as_str()].as_str().unwrap().to_string();
                let mut row = self.get(&component, &current_hash).unwrap().as_object().unwrap().clone();
                for (key, value) in changes {
                    row.insert(key.clone(), value.clone());
                }
                let new_hash = self.add(&component, Value::Object(row));
                layer_row["add"][slice.as_str()] = json!(new_hash);
            }

            let new_layer = self.add(&layer, layer_row);
            cake["layers"][layer.as_str()] = json!(new_layer);
        }

        self.add(CAKE, cake);
    }
}
