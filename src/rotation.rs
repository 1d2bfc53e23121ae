use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogSource};
use crate::constants::rotation::{DAY_FORMAT, DEFAULT_MAX_BATCH, DEFAULT_MIN_BATCH};
use crate::errors::RotationError;
use crate::state::{StateDocument, StatePatch, StateStore, TxOutcome};
use crate::types::DayId;
use crate::window::{slice_window, Window};

/// Bounds for the daily random batch draw.
#[derive(Clone, Debug)]
pub struct RotationConfig {
    /// Smallest window size drawn for a day.
    pub min_batch: u64,
    /// Largest window size drawn for a day.
    pub max_batch: u64,
    /// Fixed RNG seed for deterministic draws; `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            min_batch: DEFAULT_MIN_BATCH,
            max_batch: DEFAULT_MAX_BATCH,
            seed: None,
        }
    }
}

impl RotationConfig {
    /// Validate that `1 <= min_batch <= max_batch`.
    pub fn validated(self) -> Result<Self, RotationError> {
        if self.min_batch == 0 {
            return Err(RotationError::Configuration(
                "min_batch must be at least 1".to_string(),
            ));
        }
        if self.min_batch > self.max_batch {
            return Err(RotationError::Configuration(
                "min_batch must not exceed max_batch".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Fully-validated rotation state for one day.
///
/// Unlike [`StateDocument`], every field here is present and in range for
/// the catalog size it was validated against, and
/// `next_start_index == (start_index + batch_size) % total` always holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationState {
    /// Day this state belongs to.
    pub day: DayId,
    /// First catalog index of the window.
    pub start_index: u64,
    /// Window length in items.
    pub batch_size: u64,
    /// Cursor seeding the next day's window.
    pub next_start_index: u64,
    /// Store-assigned commit timestamp; informational only.
    pub updated_at: DateTime<Utc>,
}

/// Coordinates the once-per-day window rollover through a shared state store.
///
/// The store handle is explicit so the same coordinator runs against the
/// in-memory fake in tests and a remote document store in production.
pub struct WindowCoordinator {
    store: Arc<dyn StateStore>,
    config: RotationConfig,
}

impl WindowCoordinator {
    /// Create a coordinator over `store` with validated `config`.
    pub fn new(store: Arc<dyn StateStore>, config: RotationConfig) -> Result<Self, RotationError> {
        Ok(Self {
            store,
            config: config.validated()?,
        })
    }

    /// Ensure the shared record describes `today`'s window over `total` items.
    ///
    /// Runs the rollover decision inside the store's optimistic transaction:
    /// when the record already carries `today` the transaction is a read-only
    /// no-op, otherwise the previous day's cursor seeds a freshly drawn
    /// window and the new fields are merge-written. Racing callers all end
    /// up observing the single committed result.
    ///
    /// The batch-size draw happens inside the transaction body and may run
    /// more than once on conflict; only the committing attempt's draw is
    /// ever observable.
    pub fn ensure_window(&self, today: &str, total: u64) -> Result<RotationState, RotationError> {
        if total == 0 {
            return Err(RotationError::EmptyCatalog);
        }
        let committed = self.store.transact(&mut |doc| {
            if let Some(doc) = doc {
                if doc.day.as_deref() == Some(today) {
                    return Ok(TxOutcome::ReadOnly);
                }
            }
            // Cursor priority: next_start_index, then the legacy
            // start_index field, then 0 on first-ever run.
            let cursor = doc
                .and_then(|d| d.next_start_index.or(d.start_index))
                .unwrap_or(0);
            let start_index = cursor % total;
            let batch_size = self.draw_batch_size().min(total);
            let next_start_index = (start_index + batch_size) % total;
            debug!(today, start_index, batch_size, next_start_index, "computing rollover");
            Ok(TxOutcome::Write(StatePatch {
                day: Some(today.to_string()),
                start_index: Some(start_index),
                batch_size: Some(batch_size),
                next_start_index: Some(next_start_index),
                touch_updated_at: true,
            }))
        })?;
        normalize_state(&committed, total)
    }

    fn draw_batch_size(&self) -> u64 {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        rng.random_range(self.config.min_batch..=self.config.max_batch)
    }
}

/// Validate a committed document into a [`RotationState`].
///
/// The record is externally writable, so out-of-range numbers are corrected
/// here rather than treated as fatal: the start index is reduced mod `total`,
/// the batch size clamped into `[1, total]`, and an inconsistent cursor
/// recomputed. Every correction is logged as a data-integrity warning. Only
/// a record with no `day` at all is rejected as [`RotationError::InvalidRange`].
fn normalize_state(doc: &StateDocument, total: u64) -> Result<RotationState, RotationError> {
    let Some(day) = doc.day.clone() else {
        return Err(RotationError::InvalidRange {
            start_index: doc.start_index.unwrap_or(0),
            batch_size: doc.batch_size.unwrap_or(0),
            total,
        });
    };

    let raw_start = doc.start_index.unwrap_or_else(|| {
        warn!("rotation record missing start_index; assuming 0");
        0
    });
    let start_index = raw_start % total;
    if start_index != raw_start {
        warn!(raw_start, start_index, total, "start_index out of range; corrected");
    }

    let raw_batch = doc.batch_size.unwrap_or_else(|| {
        warn!("rotation record missing batch_size; assuming the default minimum");
        DEFAULT_MIN_BATCH
    });
    let batch_size = raw_batch.clamp(1, total);
    if batch_size != raw_batch {
        warn!(raw_batch, batch_size, total, "batch_size out of range; corrected");
    }

    let expected_next = (start_index + batch_size) % total;
    if doc.next_start_index != Some(expected_next) {
        if let Some(stored) = doc.next_start_index {
            warn!(stored, expected_next, "next_start_index inconsistent; recomputed");
        }
    }

    Ok(RotationState {
        day,
        start_index,
        batch_size,
        next_start_index: expected_next,
        updated_at: doc.updated_at.unwrap_or(DateTime::UNIX_EPOCH),
    })
}

/// Format a calendar date as a [`DayId`].
pub fn day_id(date: NaiveDate) -> DayId {
    date.format(DAY_FORMAT).to_string()
}

/// Today's [`DayId`] in UTC.
///
/// UTC keeps the day boundary identical for every client worldwide, so all
/// clients roll over at the same instant.
pub fn today_utc() -> DayId {
    day_id(Utc::now().date_naive())
}

/// Compute today's globally-shared window (UTC day).
///
/// Orchestrates loader, coordinator, and slicer; this is the caller-facing
/// entry point. Any failure degrades to an error result, never a partial
/// window.
pub fn todays_window(
    source: &dyn CatalogSource,
    store: Arc<dyn StateStore>,
    config: RotationConfig,
) -> Result<Window, RotationError> {
    window_for_day(source, store, config, &today_utc())
}

/// Compute the shared window for an explicit `day`.
///
/// Same orchestration as [`todays_window`] with the day injectable, which is
/// what the rollover tests use.
pub fn window_for_day(
    source: &dyn CatalogSource,
    store: Arc<dyn StateStore>,
    config: RotationConfig,
    day: &str,
) -> Result<Window, RotationError> {
    let catalog = Catalog::load(source)?;
    let coordinator = WindowCoordinator::new(store, config)?;
    let state = coordinator.ensure_window(day, catalog.total())?;
    let items = slice_window(&catalog, state.start_index, state.batch_size)?;
    Ok(Window {
        day: state.day,
        start_index: state.start_index,
        items,
    })
}
