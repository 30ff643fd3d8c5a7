//! # Inventory View
//!
//! Per-item `{count, limit}` as seen by one run. `count` is how many of an
//! item currently exist in the world, `limit` is how many are allowed to
//! spawn. The difference is the item's deficit: spawns that are authorized
//! but not yet realized.
//!
//! The view is read from the [`InventoryStore`] once per run and mutated in
//! memory. Increments go back to the store in bulk after the ledger has been
//! persisted.

use std::collections::{BTreeMap, HashMap};

use crate::error::LimiterResult;
use crate::table::{DropTable, ItemId, Pool};

/// Increments to apply per item, only for items with at least one drop.
pub type DeltaMap = BTreeMap<ItemId, u32>;

/// One item's externally owned counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventoryRecord {
    /// Units currently present.
    pub count: u32,
    /// Units allowed to exist.
    pub limit: u32,
}

impl InventoryRecord {
    /// Creates a record.
    #[inline]
    #[must_use]
    pub const fn new(count: u32, limit: u32) -> Self {
        Self { count, limit }
    }

    /// `max(limit - count, 0)`.
    #[inline]
    #[must_use]
    pub const fn deficit(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// In-memory snapshot of the store for the duration of one run.
#[derive(Clone, Debug, Default)]
pub struct InventoryView {
    records: HashMap<ItemId, InventoryRecord>,
}

impl InventoryView {
    /// Creates an empty view. Every item reads as `{0, 0}`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a view from store records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = (ItemId, InventoryRecord)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// The record for an item, `{0, 0}` if the snapshot had none.
    #[must_use]
    pub fn record(&self, item_id: ItemId) -> InventoryRecord {
        self.records.get(&item_id).copied().unwrap_or_default()
    }

    /// The deficit of an item.
    #[must_use]
    pub fn deficit(&self, item_id: ItemId) -> u32 {
        self.record(item_id).deficit()
    }

    /// Raises an item's limit by one after a successful drop.
    pub fn record_success(&mut self, item_id: ItemId) {
        let record = self.records.entry(item_id).or_default();
        record.limit = record.limit.saturating_add(1);
    }

    /// Sum of the deficits of every drop assigned to `pool`.
    #[must_use]
    pub fn pool_size(&self, table: &DropTable, pool: &Pool) -> u64 {
        table
            .specs_for(pool)
            .map(|spec| u64::from(self.deficit(spec.item_id)))
            .sum()
    }

    /// Returns true if the pool's combined deficit has reached its capacity.
    #[must_use]
    pub fn pool_full(&self, table: &DropTable, pool: &Pool) -> bool {
        self.pool_size(table, pool) >= u64::from(pool.capacity)
    }
}

/// The external owner of inventory counters.
pub trait InventoryStore {
    /// Reads `{count, limit}` for the requested items. Items the store does
    /// not know may be omitted.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` if the store cannot be read.
    fn snapshot(&mut self, item_ids: &[ItemId]) -> LimiterResult<InventoryView>;

    /// Applies `limit += n` for every entry.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` if the store cannot be written.
    fn apply_increments(&mut self, deltas: &DeltaMap) -> LimiterResult<()>;
}

/// A store held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<ItemId, InventoryRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an item's counters.
    pub fn insert(&mut self, item_id: ItemId, record: InventoryRecord) {
        self.records.insert(item_id, record);
    }

    /// The stored record for an item.
    #[must_use]
    pub fn get(&self, item_id: ItemId) -> Option<InventoryRecord> {
        self.records.get(&item_id).copied()
    }
}

impl FromIterator<(ItemId, InventoryRecord)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (ItemId, InventoryRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl InventoryStore for MemoryStore {
    fn snapshot(&mut self, item_ids: &[ItemId]) -> LimiterResult<InventoryView> {
        Ok(InventoryView::from_records(
            item_ids
                .iter()
                .filter_map(|id| self.records.get(id).map(|record| (*id, *record))),
        ))
    }

    fn apply_increments(&mut self, deltas: &DeltaMap) -> LimiterResult<()> {
        for (item_id, increment) in deltas {
            let record = self.records.entry(*item_id).or_default();
            record.limit = record.limit.saturating_add(*increment);
        }
        Ok(())
    }
}
