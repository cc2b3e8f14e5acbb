//! Request objects: one variant per operation the billing service understands.

use serde_json::{json, Value};
use tracing::warn;

use crate::channel::Payload;
use crate::observer::BillingEvent;
use crate::response::ResponseCode;

/// Correlation id sentinel: the acknowledgment carried no usable id, so no
/// asynchronous response will be matched to this request.
pub const IGNORE_REQUEST_ID: i64 = -1;

/// Payload keys and constants of the request/acknowledgment protocol.
///
/// Channel implementations use these to map payloads onto their concrete
/// binding.
pub mod wire {
    /// Operation tag of the request.
    pub const KEY_BILLING_REQUEST: &str = "BILLING_REQUEST";
    /// Protocol version the caller speaks.
    pub const KEY_API_VERSION: &str = "API_VERSION";
    /// Caller package identifier.
    pub const KEY_PACKAGE_NAME: &str = "PACKAGE_NAME";
    /// Anti-replay nonce, present when the operation carries one.
    pub const KEY_NONCE: &str = "NONCE";
    /// Notification ids a request refers to.
    pub const KEY_NOTIFY_IDS: &str = "NOTIFY_IDS";
    /// Item id of a purchase request.
    pub const KEY_ITEM_ID: &str = "ITEM_ID";
    /// Optional developer payload of a purchase request.
    pub const KEY_DEVELOPER_PAYLOAD: &str = "DEVELOPER_PAYLOAD";
    /// Coarse status code of an acknowledgment.
    pub const KEY_RESPONSE_CODE: &str = "RESPONSE_CODE";
    /// Server-issued correlation id of an acknowledgment.
    pub const KEY_REQUEST_ID: &str = "REQUEST_ID";
    /// Purchase-intent handle of a successful purchase acknowledgment.
    pub const KEY_PURCHASE_INTENT: &str = "PURCHASE_INTENT";
    /// Protocol version sent with every request.
    pub const API_VERSION: i64 = 1;
}

/// Operation kinds understood by the remote billing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Asks whether billing is supported for this caller.
    CheckSupport,
    /// Acknowledges previously received purchase notifications.
    ConfirmNotifications {
        /// Notification ids to confirm.
        notify_ids: Vec<String>,
    },
    /// Fetches the purchase information behind notifications.
    GetPurchaseInfo {
        /// Notification ids to look up.
        notify_ids: Vec<String>,
    },
    /// Starts the purchase of one item.
    RequestPurchase {
        /// Item to purchase.
        item_id: String,
        /// Optional payload echoed back with the resulting transaction.
        developer_payload: Option<String>,
    },
    /// Replays the account's transaction history.
    RestoreTransactions,
}

impl RequestKind {
    /// Wire tag identifying the operation.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::CheckSupport => "CHECK_BILLING_SUPPORTED",
            Self::ConfirmNotifications { .. } => "CONFIRM_NOTIFICATIONS",
            Self::GetPurchaseInfo { .. } => "GET_PURCHASE_INFORMATION",
            Self::RequestPurchase { .. } => "REQUEST_PURCHASE",
            Self::RestoreTransactions => "RESTORE_TRANSACTIONS",
        }
    }

    /// True when this operation must carry an anti-replay nonce.
    #[must_use]
    pub const fn requires_nonce(&self) -> bool {
        matches!(self, Self::GetPurchaseInfo { .. } | Self::RestoreTransactions)
    }
}

/// One queued operation: what to send and how to interpret the acknowledgment
/// and any later response-code event.
#[derive(Debug)]
pub struct BillingRequest {
    kind: RequestKind,
    package_name: String,
    start_id: u64,
    nonce: Option<u64>,
    success: bool,
}

impl BillingRequest {
    /// Creates a request for `kind` on behalf of `package_name`, under the
    /// caller-assigned sequence id `start_id`.
    #[must_use]
    pub fn new(kind: RequestKind, package_name: &str, start_id: u64) -> Self {
        Self {
            kind,
            package_name: package_name.to_owned(),
            start_id,
            nonce: None,
            success: false,
        }
    }

    /// The operation this request performs.
    #[must_use]
    pub const fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Caller-assigned sequence id.
    #[must_use]
    pub const fn start_id(&self) -> u64 {
        self.start_id
    }

    /// The nonce attached to this request, when one was allocated.
    #[must_use]
    pub const fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    /// Attaches an allocated nonce. The nonce must come from the registry the
    /// eventual push is verified against.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = Some(nonce);
    }

    /// True once the synchronous acknowledgment validated as OK.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Builds the outbound payload for this request.
    #[must_use]
    pub fn build_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert(wire::KEY_BILLING_REQUEST.to_owned(), self.kind.tag().into());
        payload.insert(wire::KEY_API_VERSION.to_owned(), wire::API_VERSION.into());
        payload.insert(
            wire::KEY_PACKAGE_NAME.to_owned(),
            self.package_name.clone().into(),
        );
        if let Some(nonce) = self.nonce {
            payload.insert(wire::KEY_NONCE.to_owned(), nonce.into());
        }
        match &self.kind {
            RequestKind::ConfirmNotifications { notify_ids }
            | RequestKind::GetPurchaseInfo { notify_ids } => {
                payload.insert(wire::KEY_NOTIFY_IDS.to_owned(), json!(notify_ids));
            }
            RequestKind::RequestPurchase {
                item_id,
                developer_payload,
            } => {
                payload.insert(wire::KEY_ITEM_ID.to_owned(), item_id.clone().into());
                if let Some(developer_payload) = developer_payload {
                    payload.insert(
                        wire::KEY_DEVELOPER_PAYLOAD.to_owned(),
                        developer_payload.clone().into(),
                    );
                }
            }
            RequestKind::CheckSupport | RequestKind::RestoreTransactions => {}
        }
        payload
    }

    /// Validates the synchronous acknowledgment and collects the events its
    /// outcome produces.
    ///
    /// Returns the server-issued correlation id, or [`IGNORE_REQUEST_ID`]
    /// when validation failed or the acknowledgment carried no id.
    pub(crate) fn handle_ack(&mut self, ack: &Payload, events: &mut Vec<BillingEvent>) -> i64 {
        let code = ack
            .get(wire::KEY_RESPONSE_CODE)
            .and_then(Value::as_i64)
            .unwrap_or(ResponseCode::Error.code());
        self.success = ResponseCode::is_ok_code(code);
        if self.success {
            self.collect_ack_events(ack, events);
            ack.get(wire::KEY_REQUEST_ID)
                .and_then(Value::as_i64)
                .unwrap_or(IGNORE_REQUEST_ID)
        } else {
            warn!(
                request = self.kind.tag(),
                code = %ResponseCode::from_code(code),
                "request rejected in acknowledgment"
            );
            if matches!(self.kind, RequestKind::CheckSupport) {
                events.push(BillingEvent::SupportChecked { supported: false });
            }
            IGNORE_REQUEST_ID
        }
    }

    /// Handles the asynchronous response-code event matched back to this
    /// request, returning the events it produces.
    #[must_use]
    pub fn on_response_code(&self, code: ResponseCode) -> Vec<BillingEvent> {
        match &self.kind {
            RequestKind::RequestPurchase { item_id, .. } => {
                let mut events = vec![BillingEvent::RequestPurchaseResponded {
                    item_id: item_id.clone(),
                    code,
                }];
                if code != ResponseCode::Ok {
                    events.push(BillingEvent::PurchaseIntentFailure {
                        item_id: item_id.clone(),
                        code,
                    });
                }
                events
            }
            RequestKind::RestoreTransactions if code == ResponseCode::Ok => {
                vec![BillingEvent::TransactionsRestored]
            }
            _ => Vec::new(),
        }
    }

    fn collect_ack_events(&self, ack: &Payload, events: &mut Vec<BillingEvent>) {
        match &self.kind {
            RequestKind::CheckSupport => {
                events.push(BillingEvent::SupportChecked { supported: true });
            }
            RequestKind::RequestPurchase { item_id, .. } => {
                if let Some(intent) = ack.get(wire::KEY_PURCHASE_INTENT).and_then(Value::as_str) {
                    events.push(BillingEvent::PurchaseIntentReady {
                        item_id: item_id.clone(),
                        intent: intent.to_owned(),
                    });
                } else {
                    warn!(%item_id, "purchase acknowledgment carried no intent handle");
                }
            }
            RequestKind::ConfirmNotifications { .. }
            | RequestKind::GetPurchaseInfo { .. }
            | RequestKind::RestoreTransactions => {}
        }
    }
}
