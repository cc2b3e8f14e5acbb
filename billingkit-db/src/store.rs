//! Capability traits for the durable purchase table.

use crate::error::DbResult;
use crate::row::PurchaseRow;

/// Handle to the durable purchase table.
///
/// Implementations own whatever connection or file state the physical engine
/// needs. All access happens through short-lived sessions so the store is
/// closed again on every exit path, including early returns on errors.
pub trait PurchaseStore: Send + Sync {
    /// Opens the store for a scoped sequence of operations.
    ///
    /// The returned session holds the store exclusively until dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`](crate::DbError::Open) when the backing store
    /// cannot be acquired.
    fn open(&self) -> DbResult<Box<dyn StoreSession + '_>>;
}

/// One open scope against the purchase table. Closed when dropped.
pub trait StoreSession {
    /// Inserts `row`, replacing any existing row with the same order id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Operation`](crate::DbError::Operation) when the
    /// write fails.
    fn upsert(&mut self, row: &PurchaseRow) -> DbResult<()>;

    /// Returns the rows matching the given filters.
    ///
    /// `item_id` and `state` are matched by equality when present; a `None`
    /// filter matches every row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Operation`](crate::DbError::Operation) when the
    /// read fails.
    fn select(&self, item_id: Option<&str>, state: Option<i64>) -> DbResult<Vec<PurchaseRow>>;

    /// Counts the rows with the given item id and state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Operation`](crate::DbError::Operation) when the
    /// read fails.
    fn count(&self, item_id: &str, state: i64) -> DbResult<usize>;
}
