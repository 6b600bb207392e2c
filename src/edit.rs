/// Edit models
///
/// An `Edit` overwrites columns of the rows matching its filter. Edits are
/// chained into a `MultiEditResolved`: a singly linked list whose head is the
/// latest edit and whose tail ends with `previous == None`. Every node is
/// identified by a content hash over its edit and its predecessor's hash, so
/// equal chains share cache entries.

use crate::error::Result;
use crate::filter::RowFilter;
use crate::hash::{hash_strings, hash_value};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Overwrite the column at `route` with `set_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAction {
    pub route: String,
    pub set_value: Value,
}

impl EditAction {
    pub fn new(route: impl Into<String>, set_value: Value) -> Self {
        EditAction {
            route: route.into(),
            set_value,
        }
    }
}

/// A named filter plus the actions applied to every matching row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub name: String,
    #[serde(default)]
    pub filter: RowFilter,
    #[serde(default)]
    pub actions: Vec<EditAction>,
}

impl Edit {
    pub fn new(name: impl Into<String>, filter: RowFilter, actions: Vec<EditAction>) -> Self {
        Edit {
            name: name.into(),
            filter,
            actions,
        }
    }

    pub fn hash(&self) -> Result<String> {
        Ok(hash_value(&serde_json::to_value(self)?))
    }
}

/// Stage `value` into every column whose route matches `route`, ignoring
/// row references. Used by `Join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetValue {
    pub route: String,
    pub value: Value,
}

impl SetValue {
    pub fn new(route: impl Into<String>, value: Value) -> Self {
        SetValue {
            route: route.into(),
            value,
        }
    }
}

/// Serialized form of a chain node: references by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiEdit {
    pub previous: Option<String>,
    pub edit: String,
    #[serde(rename = "_hash")]
    pub hash: String,
}

/// A chain node with its references resolved.
///
/// # Examples
///
/// ```
/// use sliceview::edit::{Edit, EditAction, MultiEditResolved};
/// use sliceview::filter::RowFilter;
/// use serde_json::json;
///
/// let root = MultiEditResolved::empty();
/// let first = root.push(Edit::new("a", RowFilter::empty(), vec![EditAction::new("/t/x", json!(1))])).unwrap();
/// let second = first.push(Edit::new("b", RowFilter::empty(), vec![])).unwrap();
///
/// assert!(root.is_empty());
/// assert_eq!(second.chain().len(), 3);
/// assert_eq!(second.previous().unwrap().hash(), first.hash());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MultiEditResolved {
    previous: Option<Arc<MultiEditResolved>>,
    edit: Edit,
    edit_hash: String,
    hash: String,
}

impl MultiEditResolved {
    pub fn new(previous: Option<Arc<MultiEditResolved>>, edit: Edit) -> Result<Arc<Self>> {
        let edit_hash = edit.hash()?;
        let previous_hash = previous
            .as_ref()
            .map(|p| p.hash.clone())
            .unwrap_or_default();
        let hash = hash_strings(&[previous_hash, edit_hash.clone()]);
        Ok(Arc::new(MultiEditResolved {
            previous,
            edit,
            edit_hash,
            hash,
        }))
    }

    /// The chain sentinel: no predecessor, no actions.
    pub fn empty() -> Arc<Self> {
        let edit = Edit::default();
        let edit_hash = hash_value(&Value::Null);
        let hash = hash_strings(&[String::new(), edit_hash.clone()]);
        Arc::new(MultiEditResolved {
            previous: None,
            edit,
            edit_hash,
            hash,
        })
    }

    /// A new head with `edit` on top of this node.
    pub fn push(self: &Arc<Self>, edit: Edit) -> Result<Arc<Self>> {
        Self::new(Some(self.clone()), edit)
    }

    pub fn previous(&self) -> Option<&Arc<MultiEditResolved>> {
        self.previous.as_ref()
    }

    pub fn edit(&self) -> &Edit {
        &self.edit
    }

    pub fn edit_hash(&self) -> &str {
        &self.edit_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_none() && self.edit.actions.is_empty()
    }

    /// All nodes from the root to this one.
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<MultiEditResolved>> {
        let mut nodes = Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            cursor = node.previous.clone();
            nodes.push(node);
        }
        nodes.reverse();
        nodes
    }

    /// Routes targeted by the actions of the whole chain, root first.
    pub fn action_routes(self: &Arc<Self>) -> Vec<String> {
        let mut routes: Vec<String> = Vec::new();
        for node in self.chain() {
            for action in &node.edit.actions {
                if !routes.contains(&action.route) {
                    routes.push(action.route.clone());
                }
            }
        }
        routes
    }

    pub fn model(&self) -> MultiEdit {
        MultiEdit {
            previous: self.previous.as_ref().map(|p| p.hash.clone()),
            edit: self.edit_hash.clone(),
            hash: self.hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnFilter, StringOperator};
    use serde_json::json;

    fn edit(name: &str) -> Edit {
        Edit::new(
            name,
            RowFilter::and(vec![ColumnFilter::string("/t/a", StringOperator::Equals, "x")]),
            vec![EditAction::new("/t/b", json!(true))],
        )
    }

    #[test]
    fn test_edit_serde_model() {
        let json = serde_json::to_value(edit("e")).unwrap();
        assert_eq!(json["actions"][0]["setValue"], json!(true));
        assert_eq!(json["filter"]["columnFilters"][0]["operator"], "equals");

        let back: Edit = serde_json::from_value(json).unwrap();
        assert_eq!(back, edit("e"));
    }

    #[test]
    fn test_hash_depends_on_content_and_previous() {
        let root = MultiEditResolved::empty();
        let a = root.push(edit("e")).unwrap();
        let b = root.push(edit("e")).unwrap();
        assert_eq!(a.hash(), b.hash());

        let c = MultiEditResolved::new(None, edit("e")).unwrap();
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a.edit_hash(), c.edit_hash());

        let d = root.push(edit("other")).unwrap();
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_chain_and_model() {
        let root = MultiEditResolved::empty();
        let a = root.push(edit("a")).unwrap();
        let b = a.push(edit("b")).unwrap();

        let names: Vec<String> = b.chain().iter().map(|n| n.edit().name.clone()).collect();
        assert_eq!(names, vec!["", "a", "b"]);
        assert_eq!(b.action_routes(), vec!["/t/b".to_string()]);

        let model = b.model();
        assert_eq!(model.previous.as_deref(), Some(a.hash()));
        assert_eq!(model.edit, b.edit_hash());
        assert!(root.model().previous.is_none());
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(MultiEditResolved::empty().is_empty());
        assert_eq!(MultiEditResolved::empty().hash(), MultiEditResolved::empty().hash());
        assert!(!MultiEditResolved::new(None, edit("a")).unwrap().is_empty());
    }
}
