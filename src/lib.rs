#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Catalog items, the source seam, and canonical byte-wise ordering.
pub mod catalog;
/// Constants for rotation defaults and state persistence.
pub mod constants;
mod errors;
/// Rotation coordination and the caller-facing window API.
pub mod rotation;
/// The shared rotation record and its store backends.
pub mod state;
/// Shared type aliases.
pub mod types;
/// Pure window slicing over the ordered catalog.
pub mod window;

pub use catalog::{Catalog, CatalogItem, CatalogSource, InMemoryCatalogSource};
pub use errors::RotationError;
pub use rotation::{
    day_id, today_utc, todays_window, window_for_day, RotationConfig, RotationState,
    WindowCoordinator,
};
pub use state::{
    MemoryStateStore, SqliteStateStore, StateDocument, StatePatch, StateStore, TxOutcome,
};
pub use types::{DayId, ItemId, Revision, SourceId};
pub use window::{slice_window, Window};
