//! Event fan-out to registered observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::response::ResponseCode;
use crate::transaction::PurchaseState;

/// A verified, correlated billing outcome on its way to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// Answer to a support check.
    SupportChecked {
        /// Whether billing is supported for this caller.
        supported: bool,
    },
    /// Purchase-intent handle extracted from a successful purchase
    /// acknowledgment.
    PurchaseIntentReady {
        /// Item the intent belongs to.
        item_id: String,
        /// Opaque handle the host uses to launch the purchase flow.
        intent: String,
    },
    /// The service rejected a purchase request.
    PurchaseIntentFailure {
        /// Item whose purchase was requested.
        item_id: String,
        /// Failure code reported by the service.
        code: ResponseCode,
    },
    /// Authoritative state change for one item, from a verified push.
    PurchaseStateChanged {
        /// Item whose state changed.
        item_id: String,
        /// New purchase state.
        state: PurchaseState,
    },
    /// Response code for a previously sent purchase request.
    RequestPurchaseResponded {
        /// Item whose purchase was requested.
        item_id: String,
        /// Response code reported by the service.
        code: ResponseCode,
    },
    /// The restore-transactions request was accepted by the service.
    TransactionsRestored,
}

/// Receives billing events. Implementations must tolerate delivery from
/// whichever thread drove the triggering operation.
pub trait BillingObserver: Send + Sync {
    /// Called with the answer to a support check.
    fn on_check_support_response(&self, supported: bool);

    /// Called when a purchase acknowledgment carried an intent handle for the
    /// item.
    fn on_purchase_intent_ready(&self, item_id: &str, intent: &str);

    /// Called when the service rejected a purchase request for the item.
    fn on_purchase_intent_failure(&self, item_id: &str, code: ResponseCode);

    /// Called when a verified push changed the purchase state of the item.
    fn on_purchase_state_changed(&self, item_id: &str, state: PurchaseState);

    /// Called with the response code of a purchase request.
    fn on_request_purchase_response(&self, item_id: &str, code: ResponseCode);

    /// Called when a restore-transactions request was accepted.
    fn on_transactions_restored(&self);
}

/// Set of registered observers with snapshot fan-out.
///
/// Registration and fan-out never race: each delivery iterates a point-in-time
/// snapshot taken under the lock, so an observer added or removed mid-wave
/// neither errors nor is guaranteed to see that wave.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn BillingObserver>>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("len", &self.lock().len())
            .finish()
    }
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer`. Returns false when it was already registered.
    pub fn register(&self, observer: Arc<dyn BillingObserver>) -> bool {
        let mut observers = self.lock();
        if observers.iter().any(|existing| Arc::ptr_eq(existing, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Unregisters `observer`. Returns false when it was not registered.
    pub fn unregister(&self, observer: &Arc<dyn BillingObserver>) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        observers.len() != before
    }

    /// Delivers `event` to a snapshot of the registered observers.
    pub fn dispatch(&self, event: &BillingEvent) {
        for observer in self.snapshot() {
            match event {
                BillingEvent::SupportChecked { supported } => {
                    observer.on_check_support_response(*supported);
                }
                BillingEvent::PurchaseIntentReady { item_id, intent } => {
                    observer.on_purchase_intent_ready(item_id, intent);
                }
                BillingEvent::PurchaseIntentFailure { item_id, code } => {
                    observer.on_purchase_intent_failure(item_id, *code);
                }
                BillingEvent::PurchaseStateChanged { item_id, state } => {
                    observer.on_purchase_state_changed(item_id, *state);
                }
                BillingEvent::RequestPurchaseResponded { item_id, code } => {
                    observer.on_request_purchase_response(item_id, *code);
                }
                BillingEvent::TransactionsRestored => observer.on_transactions_restored(),
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn BillingObserver>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn BillingObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
