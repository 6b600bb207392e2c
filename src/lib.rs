/// SliceView - Column-Oriented Views over Content-Addressed Tables
///
/// Select columns across a tree of referencing tables, filter, sort and edit
/// them, and write the edited result back as insert commands. Every view is
/// an immutable snapshot identified by a content hash; edit chains are
/// replayed incrementally through a hash-keyed cache.
///
/// With the `reactive` feature (on by default) the pipeline can also run as
/// a tokio task that recomputes whenever one of its inputs changes.

pub mod error;
pub mod hash;
pub mod value;
pub mod route;
pub mod column_selection;
pub mod filter;
pub mod filter_processor;
pub mod sort;
pub mod edit;
pub mod view;
pub mod edited;
pub mod cache;
pub mod join;

#[cfg(feature = "reactive")]
pub mod reactive;

pub use error::{Error, Result};
pub use route::{Route, RouteSegment};
pub use column_selection::{ColumnInfo, ColumnLookup, ColumnSelection};
pub use filter_processor::RowFilterProcessor;
pub use sort::{RowSort, SortDirection};
pub use view::{Row, Rows, View, ViewCore, ViewEmpty, ViewFiltered, ViewSelected, ViewSorted, ViewWithData};
pub use edited::{ViewEdited, ViewEditedMultiple};
pub use cache::{CacheKey, ViewCache};
pub use join::{InsertCommand, Join};

#[cfg(feature = "reactive")]
pub use reactive::{
    Debouncer, MultiEditMixer, PipelineWarning, ProcessedConfig, ProcessedSources, ViewProcessed, WarningHandler,
};
