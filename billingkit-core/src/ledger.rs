//! Durable, obfuscated ledger of purchase transactions.

use std::sync::Arc;

use billingkit_db::{DbError, PurchaseRow, PurchaseStore};
use thiserror::Error;

use crate::obfuscate::ObfuscationCodec;
use crate::transaction::{PurchaseState, Transaction};

/// Error returned by ledger operations.
///
/// Unlike forged or malformed pushes, which are silently rejected, ledger
/// failures indicate a local resource problem and propagate to the caller.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Durable store of transaction records, keyed by order id.
///
/// Order id, item id and developer payload are obfuscated before they reach
/// the store and de-obfuscated on the way out; callers only ever see clear
/// values. Every operation acquires the store in a scope: open, operate,
/// closed again on drop whichever way the operation exits.
pub struct TransactionLedger {
    store: Arc<dyn PurchaseStore>,
    codec: ObfuscationCodec,
}

impl std::fmt::Debug for TransactionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLedger")
            .field("codec", &self.codec)
            .finish()
    }
}

impl TransactionLedger {
    /// Creates a ledger over `store`, obfuscating fields with `codec`.
    #[must_use]
    pub fn new(store: Arc<dyn PurchaseStore>, codec: ObfuscationCodec) -> Self {
        Self { store, codec }
    }

    /// Records `transaction`, replacing any earlier record with the same
    /// order id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be opened or the
    /// write fails.
    pub fn record(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.warn_if_unkeyed();
        let row = PurchaseRow {
            order_id: self.codec.obfuscate(&transaction.order_id),
            item_id: self.codec.obfuscate(&transaction.item_id),
            state: transaction.state.code(),
            purchase_time: transaction.purchase_time,
            developer_payload: transaction
                .developer_payload
                .as_deref()
                .map(|payload| self.codec.obfuscate(payload)),
        };
        let mut session = self.store.open()?;
        session.upsert(&row)?;
        Ok(())
    }

    /// Returns every recorded transaction, including cancellations and
    /// refunds.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read.
    pub fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.query(None, None)
    }

    /// Returns the recorded transactions of one item.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read.
    pub fn transactions_for(&self, item_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.query(Some(item_id), None)
    }

    /// Returns the recorded transactions matching the given filters.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read.
    pub fn transactions_matching(
        &self,
        item_id: Option<&str>,
        state: Option<PurchaseState>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.query(item_id, state)
    }

    /// Counts the purchases of one item. Cancellations and refunds are
    /// separate states and never decrement this count.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read.
    pub fn count_purchases(&self, item_id: &str) -> Result<usize, LedgerError> {
        self.warn_if_unkeyed();
        let stored_item = self.codec.obfuscate(item_id);
        let session = self.store.open()?;
        Ok(session.count(&stored_item, PurchaseState::Purchased.code())?)
    }

    /// Returns true when the item has at least one recorded purchase. A later
    /// cancellation or refund does not flip this back.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read.
    pub fn is_purchased(&self, item_id: &str) -> Result<bool, LedgerError> {
        Ok(self.count_purchases(item_id)? > 0)
    }

    fn query(
        &self,
        item_id: Option<&str>,
        state: Option<PurchaseState>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.warn_if_unkeyed();
        let stored_item = item_id.map(|id| self.codec.obfuscate(id));
        let session = self.store.open()?;
        let rows = session.select(stored_item.as_deref(), state.map(PurchaseState::code))?;
        Ok(rows.into_iter().map(|row| self.restore(row)).collect())
    }

    fn restore(&self, row: PurchaseRow) -> Transaction {
        Transaction {
            order_id: self.codec.unobfuscate(&row.order_id),
            item_id: self.codec.unobfuscate(&row.item_id),
            state: PurchaseState::from_code(row.state),
            purchase_time: row.purchase_time,
            developer_payload: row
                .developer_payload
                .as_deref()
                .map(|payload| self.codec.unobfuscate(payload)),
            // The notification id is transient and never persisted.
            notification_id: None,
        }
    }

    fn warn_if_unkeyed(&self) {
        if !self.codec.is_keyed() {
            ObfuscationCodec::warn_unkeyed();
        }
    }
}
