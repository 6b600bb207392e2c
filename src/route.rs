/// Routes
///
/// A route addresses a column through the table reference graph, e.g.
/// `/carCake/carGeneralLayer/carGeneral/brand`. Every segment names a table
/// (the last one names the column) and may carry a reference to a concrete
/// row: `/carCake@a1b2/carGeneralLayer/carGeneral/brand`.
///
/// The same column is reachable through many concrete rows, so most
/// comparisons go through the ref-free shape of a route
/// ([`Route::without_refs`], [`Route::equals_without_refs`]).
///
/// # Examples
///
/// ```
/// use sliceview::Route;
///
/// let route = Route::from_flat("/carCake@x1/carGeneralLayer/carGeneral/brand").unwrap();
/// assert_eq!(route.depth(), 4);
/// assert_eq!(route.leaf().table_key(), "brand");
/// assert_eq!(route.upper(1).flat(), "/carCake@x1/carGeneralLayer/carGeneral");
/// assert_eq!(route.flat_without_refs(), "/carCake/carGeneralLayer/carGeneral/brand");
///
/// let plain = Route::from_flat("/carCake/carGeneralLayer/carGeneral/brand").unwrap();
/// assert!(route.equals_without_refs(&plain));
/// assert_ne!(route, plain);
/// ```

use crate::error::{Error, Result};
use crate::value::is_lower_camel_case;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One hop of a route: a table (or column) key and an optional row reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteSegment {
    table_key: String,
    reference: Option<String>,
}

impl RouteSegment {
    pub fn new(table_key: impl Into<String>) -> Self {
        RouteSegment {
            table_key: table_key.into(),
            reference: None,
        }
    }

    pub fn with_ref(table_key: impl Into<String>, reference: impl Into<String>) -> Self {
        RouteSegment {
            table_key: table_key.into(),
            reference: Some(reference.into()),
        }
    }

    pub fn table_key(&self) -> &str {
        &self.table_key
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// The same segment without its row reference.
    pub fn without_ref(&self) -> RouteSegment {
        RouteSegment::new(self.table_key.clone())
    }

    fn parse(flat: &str, text: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRoute {
            route: flat.to_string(),
            reason: reason.to_string(),
        };

        let (key, reference) = match text.split_once('@') {
            Some((key, reference)) => {
                if reference.is_empty() {
                    return Err(invalid("empty row reference"));
                }
                (key, Some(reference.to_string()))
            }
            None => (text, None),
        };

        if !is_lower_camel_case(key) {
            return Err(invalid(&format!("segment '{}' is not lower camel case", key)));
        }

        Ok(RouteSegment {
            table_key: key.to_string(),
            reference,
        })
    }
}

impl fmt::Display for RouteSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}@{}", self.table_key, reference),
            None => write!(f, "{}", self.table_key),
        }
    }
}

/// A slash-delimited path of segments through the table reference graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Route {
    segments: Vec<RouteSegment>,
}

impl Route {
    pub fn new(segments: Vec<RouteSegment>) -> Self {
        Route { segments }
    }

    /// Parse a flat route such as `/cake/layer@ref/component/column`.
    /// The leading slash is optional.
    pub fn from_flat(flat: &str) -> Result<Self> {
        let trimmed = flat.strip_prefix('/').unwrap_or(flat);
        if trimmed.is_empty() {
            return Err(Error::InvalidRoute {
                route: flat.to_string(),
                reason: "route has no segments".to_string(),
            });
        }

        let segments = trimmed
            .split('/')
            .map(|part| {
                if part.is_empty() {
                    Err(Error::InvalidRoute {
                        route: flat.to_string(),
                        reason: "empty segment".to_string(),
                    })
                } else {
                    RouteSegment::parse(flat, part)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Route { segments })
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if the route consists of a single segment.
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// First segment. Panics on an empty route, which `from_flat` never builds.
    pub fn top(&self) -> &RouteSegment {
        &self.segments[0]
    }

    /// Last segment (the column for a column route).
    pub fn leaf(&self) -> &RouteSegment {
        &self.segments[self.segments.len() - 1]
    }

    /// The route without its last `n` segments.
    pub fn upper(&self, n: usize) -> Route {
        let keep = self.segments.len().saturating_sub(n);
        Route {
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// The route without its first `n` segments.
    pub fn deeper(&self, n: usize) -> Route {
        let skip = n.min(self.segments.len());
        Route {
            segments: self.segments[skip..].to_vec(),
        }
    }

    /// The first `depth` segments.
    pub fn truncate(&self, depth: usize) -> Route {
        let keep = depth.min(self.segments.len());
        Route {
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// True if `other`, ignoring refs, is a prefix of this route.
    pub fn includes(&self, other: &Route) -> bool {
        other.segments.len() <= self.segments.len()
            && other
                .segments
                .iter()
                .zip(&self.segments)
                .all(|(a, b)| a.table_key == b.table_key)
    }

    /// The same path with every row reference stripped.
    pub fn without_refs(&self) -> Route {
        Route {
            segments: self.segments.iter().map(RouteSegment::without_ref).collect(),
        }
    }

    /// True if both routes address the same column regardless of the rows
    /// traversed on the way.
    pub fn equals_without_refs(&self, other: &Route) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.table_key == b.table_key)
    }

    pub fn has_refs(&self) -> bool {
        self.segments.iter().any(|s| s.reference.is_some())
    }

    pub fn flat(&self) -> String {
        self.to_string()
    }

    pub fn flat_without_refs(&self) -> String {
        self.without_refs().to_string()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Route::from_flat(s)
    }
}

impl Serialize for Route {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.flat())
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let flat = String::deserialize(deserializer)?;
        Route::from_flat(&flat).map_err(serde::de::Error::custom)
    }
}
