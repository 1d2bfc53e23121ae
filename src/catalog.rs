use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::errors::RotationError;
use crate::types::{ItemId, SourceId};

/// One rotating catalog entry.
///
/// Items are owned by the catalog store and read-only here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable globally-unique identifier; doubles as the total-order sort key.
    pub id: ItemId,
    /// Display text for the item.
    pub text: String,
    /// Reference to the item's image asset.
    pub image_ref: String,
    /// Attribution or origin reference.
    pub source_ref: String,
}

/// Catalog-store collaborator seam.
///
/// Implementations may fetch over the network or serve from memory.
/// Retrieval order is irrelevant: [`Catalog::load`] imposes the canonical
/// byte-wise ordering on whatever a source returns.
pub trait CatalogSource: Send + Sync {
    /// Stable source identifier used in error reporting.
    fn id(&self) -> &str;
    /// Bulk-read every item the source currently holds.
    fn fetch_all(&self) -> Result<Vec<CatalogItem>, RotationError>;
}

/// In-memory catalog source for tests and embedded catalogs.
pub struct InMemoryCatalogSource {
    id: SourceId,
    items: Arc<Vec<CatalogItem>>,
}

impl InMemoryCatalogSource {
    /// Create an in-memory source from prebuilt items.
    pub fn new(id: impl Into<SourceId>, items: Vec<CatalogItem>) -> Self {
        Self {
            id: id.into(),
            items: Arc::new(items),
        }
    }
}

impl CatalogSource for InMemoryCatalogSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_all(&self) -> Result<Vec<CatalogItem>, RotationError> {
        Ok(self.items.as_ref().clone())
    }
}

/// Byte-wise-ordered view over one catalog snapshot.
///
/// Every client that loads the same underlying item set derives the same
/// ordered sequence here, independent of the order the source returned
/// items in. This ordering is the sole mechanism that lets disconnected
/// clients agree on what "index `i`" means.
#[derive(Clone, Debug)]
pub struct Catalog {
    items: IndexMap<ItemId, CatalogItem>,
}

impl Catalog {
    /// Load the full catalog from `source` and impose the canonical order.
    ///
    /// Fails with [`RotationError::CatalogUnavailable`] when the fetch fails
    /// or the source yields zero items. Duplicate ids keep the first
    /// occurrence and are logged.
    pub fn load(source: &dyn CatalogSource) -> Result<Self, RotationError> {
        let mut fetched = source.fetch_all()?;
        if fetched.is_empty() {
            return Err(RotationError::CatalogUnavailable {
                source_id: source.id().to_string(),
                reason: "source returned zero items".to_string(),
            });
        }
        fetched.sort_by(|a, b| a.id.as_bytes().cmp(b.id.as_bytes()));
        let mut items = IndexMap::with_capacity(fetched.len());
        for item in fetched {
            if items.contains_key(&item.id) {
                warn!(id = %item.id, "duplicate catalog id; keeping first occurrence");
                continue;
            }
            items.insert(item.id.clone(), item);
        }
        Ok(Self { items })
    }

    /// Number of distinct items in the ordered catalog.
    pub fn total(&self) -> u64 {
        self.items.len() as u64
    }

    /// Whether the catalog holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at ordered position `idx`.
    pub fn get(&self, idx: usize) -> Option<&CatalogItem> {
        self.items.get_index(idx).map(|(_, item)| item)
    }

    /// Iterate items in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values()
    }
}
