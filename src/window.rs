use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogItem};
use crate::errors::RotationError;
use crate::types::DayId;

/// The catalog subset designated for one day.
///
/// Derived on every read from the ordered catalog and the day's rotation
/// state; never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Day this window belongs to.
    pub day: DayId,
    /// First catalog index of the window.
    pub start_index: u64,
    /// The windowed items, in catalog order with wrap-around.
    pub items: Vec<CatalogItem>,
}

/// Extract a contiguous wrap-around window from the ordered catalog.
///
/// Pure and deterministic: item `k` of the result is the catalog item at
/// index `(start_index + k) % total`. The range checks guard against a
/// malformed persisted record; with a coordinator-produced state they are
/// unreachable.
pub fn slice_window(
    catalog: &Catalog,
    start_index: u64,
    batch_size: u64,
) -> Result<Vec<CatalogItem>, RotationError> {
    let total = catalog.total();
    if batch_size == 0 || batch_size > total || start_index >= total {
        return Err(RotationError::InvalidRange {
            start_index,
            batch_size,
            total,
        });
    }
    let mut items = Vec::with_capacity(batch_size as usize);
    for k in 0..batch_size {
        let idx = ((start_index + k) % total) as usize;
        let item = catalog.get(idx).ok_or(RotationError::InvalidRange {
            start_index,
            batch_size,
            total,
        })?;
        items.push(item.clone());
    }
    Ok(items)
}
