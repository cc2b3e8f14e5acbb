//! At-rest representation of a purchase.

use serde::{Deserialize, Serialize};

/// One purchase as persisted by a [`PurchaseStore`](crate::PurchaseStore).
///
/// `order_id` is the primary key: writing a row under an existing order id
/// replaces the previous row. `order_id`, `item_id` and `developer_payload`
/// arrive in whatever (possibly obfuscated) form the caller hands in and are
/// stored verbatim; `state` and `purchase_time` are stored in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRow {
    /// Server-assigned order identifier, primary key.
    pub order_id: String,
    /// Identifier of the purchased item.
    pub item_id: String,
    /// Purchase-state discriminant.
    pub state: i64,
    /// Purchase timestamp, milliseconds since the epoch.
    pub purchase_time: i64,
    /// Optional payload the developer attached to the purchase.
    pub developer_payload: Option<String>,
}
