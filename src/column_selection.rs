/// Column selections
///
/// A `ColumnSelection` is an immutable, ordered list of column descriptors.
/// Aliases and routes are unique within a selection; every transformation
/// returns a new selection.
///
/// # Examples
///
/// ```
/// use sliceview::{ColumnSelection, Route};
///
/// let routes = vec![
///     Route::from_flat("/carCake/carGeneralLayer/carGeneral/brand").unwrap(),
///     Route::from_flat("/carCake/carTechLayer/carTechnical/brand").unwrap(),
///     Route::from_flat("/carCake/carGeneralLayer/carGeneral/brand").unwrap(),
/// ];
/// let selection = ColumnSelection::from_routes(&routes).unwrap();
///
/// assert_eq!(selection.count(), 2);
/// assert_eq!(selection.aliases(), &["brand".to_string(), "brand1".to_string()]);
/// assert_eq!(selection.column_index("brand1").unwrap(), 1);
/// ```

use crate::error::{Error, Result};
use crate::hash::{hash_str, hash_strings};
use crate::route::Route;
use crate::value::{is_lower_camel_case, ColumnType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Describes one selected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Key of the column in its table (the route's leaf)
    pub key: String,
    /// Unique, lower camel case name of the column within the selection
    pub alias: String,
    /// Flat route of the column
    pub route: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Content hash of the flat route
    pub route_hash: String,
    /// Position of the column in its selection
    pub index: usize,
}

impl ColumnInfo {
    /// Describe a column. The key, route hash and index are derived.
    pub fn new(alias: impl Into<String>, route: &Route, column_type: ColumnType) -> Self {
        let flat = route.flat();
        ColumnInfo {
            key: if route.is_empty() {
                String::new()
            } else {
                route.leaf().table_key().to_string()
            },
            alias: alias.into(),
            route_hash: hash_str(&flat),
            route: flat,
            column_type,
            index: 0,
        }
    }
}

/// Something a column can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLookup<'a> {
    /// A column position, passed through unchanged
    Index(usize),
    /// A route hash, an alias or a flat route (tried in that order)
    Key(&'a str),
}

impl From<usize> for ColumnLookup<'_> {
    fn from(index: usize) -> Self {
        ColumnLookup::Index(index)
    }
}

impl<'a> From<&'a str> for ColumnLookup<'a> {
    fn from(key: &'a str) -> Self {
        ColumnLookup::Key(key)
    }
}

impl<'a> From<&'a String> for ColumnLookup<'a> {
    fn from(key: &'a String) -> Self {
        ColumnLookup::Key(key.as_str())
    }
}

/// An ordered, alias-unique and route-unique list of columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnSelection {
    columns: Vec<ColumnInfo>,
    parsed_routes: Vec<Route>,
    aliases: Vec<String>,
    routes: Vec<String>,
    route_hashes: Vec<String>,
    by_hash: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    by_route: HashMap<String, usize>,
    hash: String,
}

impl PartialEq for ColumnSelection {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl ColumnSelection {
    /// Build a selection, validating aliases and routes.
    ///
    /// Column indices are renumbered to the positions in `columns`.
    pub fn new(columns: Vec<ColumnInfo>) -> Result<Self> {
        let mut selection = ColumnSelection::default();

        for (index, mut column) in columns.into_iter().enumerate() {
            if !is_lower_camel_case(&column.alias) {
                return Err(Error::InvalidName {
                    kind: "alias",
                    name: column.alias,
                });
            }

            let route = Route::from_flat(&column.route).map_err(|err| match err {
                Error::InvalidRoute { route, .. } => Error::InvalidName { kind: "route", name: route },
                other => other,
            })?;
            let flat = route.flat();

            if selection.by_alias.contains_key(&column.alias) {
                return Err(Error::DuplicateAlias(column.alias));
            }
            if selection.by_route.contains_key(&flat) {
                return Err(Error::DuplicateRoute(flat));
            }

            column.index = index;
            column.route = flat.clone();
            column.key = route.leaf().table_key().to_string();
            column.route_hash = hash_str(&flat);

            selection.by_alias.insert(column.alias.clone(), index);
            selection.by_route.insert(flat.clone(), index);
            selection.by_hash.insert(column.route_hash.clone(), index);
            selection.aliases.push(column.alias.clone());
            selection.routes.push(flat);
            selection.route_hashes.push(column.route_hash.clone());
            selection.parsed_routes.push(route);
            selection.columns.push(column);
        }

        selection.hash = hash_strings(&selection.route_hashes);
        Ok(selection)
    }

    /// A selection without columns.
    pub fn empty() -> Self {
        ColumnSelection {
            hash: hash_strings::<String>(&[]),
            ..ColumnSelection::default()
        }
    }

    /// Remove duplicate routes, keeping the first occurrence of each.
    pub fn unique_routes(routes: &[Route]) -> Vec<Route> {
        let mut seen = HashSet::new();
        routes
            .iter()
            .filter(|route| seen.insert(route.flat()))
            .cloned()
            .collect()
    }

    /// Derive a selection from raw routes.
    ///
    /// Duplicate routes are dropped. Each column is aliased by its key; a key
    /// used more than once gets a numeric suffix (`brand`, `brand1`, ...).
    pub fn from_routes(routes: &[Route]) -> Result<Self> {
        let mut alias_counts: HashMap<String, usize> = HashMap::new();
        let mut columns = Vec::new();

        for route in Self::unique_routes(routes) {
            if route.is_empty() {
                return Err(Error::InvalidRoute {
                    route: String::new(),
                    reason: "route has no segments".to_string(),
                });
            }
            let key = route.leaf().table_key().to_string();
            let count = alias_counts.entry(key.clone()).or_insert(0);
            let alias = if *count == 0 {
                key.clone()
            } else {
                format!("{}{}", key, count)
            };
            *count += 1;
            columns.push(ColumnInfo::new(alias, &route, ColumnType::JsonValue));
        }

        Self::new(columns)
    }

    /// Union the routes of several selections into a fresh selection.
    pub fn merge(selections: &[&ColumnSelection]) -> Result<Self> {
        let routes: Vec<Route> = selections
            .iter()
            .flat_map(|s| s.parsed_routes.iter().cloned())
            .collect();
        Self::from_routes(&routes)
    }

    /// Routes of this selection that `other` does not contain.
    pub fn added_columns(&self, other: &ColumnSelection) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !other.by_hash.contains_key(&c.route_hash))
            .map(|c| c.route.clone())
            .collect()
    }

    /// Resolve a column position. Lookup order: index passthrough, route hash,
    /// alias, flat route.
    pub fn column_index<'a>(&self, lookup: impl Into<ColumnLookup<'a>>) -> Result<usize> {
        let lookup = lookup.into();
        self.try_column_index(lookup).ok_or_else(|| Error::ColumnNotFound {
            key: match lookup {
                ColumnLookup::Index(i) => i.to_string(),
                ColumnLookup::Key(key) => key.to_string(),
            },
            available: self.routes.clone(),
        })
    }

    /// Like [`column_index`](Self::column_index) but returns `None` on a miss.
    pub fn try_column_index<'a>(&self, lookup: impl Into<ColumnLookup<'a>>) -> Option<usize> {
        match lookup.into() {
            ColumnLookup::Index(index) => Some(index),
            ColumnLookup::Key(key) => self
                .by_hash
                .get(key)
                .or_else(|| self.by_alias.get(key))
                .or_else(|| self.by_route.get(key))
                .copied(),
        }
    }

    /// Position of the column with the given route hash.
    pub fn index_of_hash(&self, route_hash: &str) -> Option<usize> {
        self.by_hash.get(route_hash).copied()
    }

    pub fn count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    pub fn parsed_routes(&self) -> &[Route] {
        &self.parsed_routes
    }

    pub fn route_hashes(&self) -> &[String] {
        &self.route_hashes
    }

    /// Content hash over the route hashes, in column order.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }

    /// A copy of this selection with the given column types.
    pub fn with_types(&self, types: &[ColumnType]) -> ColumnSelection {
        let mut selection = self.clone();
        for (column, column_type) in selection.columns.iter_mut().zip(types) {
            column.column_type = *column_type;
        }
        selection
    }
}
