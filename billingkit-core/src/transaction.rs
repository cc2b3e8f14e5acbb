//! Purchase transactions and the signed wire document they arrive in.

use serde::Deserialize;
use strum::{Display, FromRepr};

/// State of a purchase as reported by the billing service.
///
/// Refunds and cancellations are distinct states, not deletions: a refunded
/// purchase stays in the ledger with its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(i64)]
pub enum PurchaseState {
    /// The item was purchased.
    Purchased = 0,
    /// The purchase was canceled.
    Canceled = 1,
    /// The purchase was refunded.
    Refunded = 2,
    /// Fallback for state codes this library does not recognize.
    Unknown = 3,
}

impl PurchaseState {
    /// Decodes a raw state code, mapping unrecognized values to
    /// [`Self::Unknown`].
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        Self::from_repr(code).unwrap_or(Self::Unknown)
    }

    /// Returns the stored discriminant of this state.
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }
}

/// One purchase event reported by the billing service.
///
/// Identity is the order id: recording a transaction with an order id already
/// in the ledger replaces the earlier record. Values of this type are always
/// in the clear; obfuscation happens at the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Server-assigned order identifier.
    pub order_id: String,
    /// Identifier of the purchased item.
    pub item_id: String,
    /// Purchase state.
    pub state: PurchaseState,
    /// Purchase timestamp, milliseconds since the epoch.
    pub purchase_time: i64,
    /// Optional payload the developer attached to the purchase request.
    pub developer_payload: Option<String>,
    /// Notification id awaiting confirmation, when the service sent one.
    pub notification_id: Option<String>,
}

/// Signed purchase-state document: the payload of a `purchaseStateChanged`
/// push, before signature and nonce checks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PurchaseUpdate {
    /// Nonce previously issued to a request, echoed back by the service.
    pub nonce: u64,
    /// Purchase events carried by this document.
    #[serde(default)]
    pub orders: Vec<OrderElement>,
}

impl PurchaseUpdate {
    /// Parses the raw signed-data string.
    pub(crate) fn parse(signed_data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(signed_data)
    }
}

/// One order entry inside a [`PurchaseUpdate`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderElement {
    pub notification_id: Option<String>,
    pub order_id: String,
    pub product_id: String,
    pub purchase_time: i64,
    pub purchase_state: i64,
    pub developer_payload: Option<String>,
}

impl From<OrderElement> for Transaction {
    fn from(order: OrderElement) -> Self {
        Self {
            order_id: order.order_id,
            item_id: order.product_id,
            state: PurchaseState::from_code(order.purchase_state),
            purchase_time: order.purchase_time,
            developer_payload: order.developer_payload,
            notification_id: order.notification_id,
        }
    }
}
