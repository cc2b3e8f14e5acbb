//! In-memory purchase table.
//!
//! Backs the test suites and hosts without durable storage. Rows live in a
//! mutex-guarded map for the lifetime of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DbError, DbResult};
use crate::row::PurchaseRow;
use crate::store::{PurchaseStore, StoreSession};

/// Purchase table held entirely in memory, keyed by order id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, PurchaseRow>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PurchaseStore for MemoryStore {
    fn open(&self) -> DbResult<Box<dyn StoreSession + '_>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| DbError::Open("memory store mutex poisoned".to_owned()))?;
        Ok(Box::new(MemorySession { rows }))
    }
}

/// Session holding the table lock for its whole scope.
struct MemorySession<'a> {
    rows: MutexGuard<'a, HashMap<String, PurchaseRow>>,
}

impl StoreSession for MemorySession<'_> {
    fn upsert(&mut self, row: &PurchaseRow) -> DbResult<()> {
        self.rows.insert(row.order_id.clone(), row.clone());
        Ok(())
    }

    fn select(&self, item_id: Option<&str>, state: Option<i64>) -> DbResult<Vec<PurchaseRow>> {
        Ok(self
            .rows
            .values()
            .filter(|row| item_id.is_none_or(|id| row.item_id == id))
            .filter(|row| state.is_none_or(|s| row.state == s))
            .cloned()
            .collect())
    }

    fn count(&self, item_id: &str, state: i64) -> DbResult<usize> {
        Ok(self
            .rows
            .values()
            .filter(|row| row.item_id == item_id && row.state == state)
            .count())
    }
}
