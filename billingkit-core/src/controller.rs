//! Controller façade: public operations, push intake, and the state shared
//! between them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use billingkit_db::PurchaseStore;
use tracing::{debug, error, warn};

use crate::channel::{BillingChannel, BillingConnector};
use crate::config::BillingConfig;
use crate::correlator::ResponseCorrelator;
use crate::dispatcher::RequestDispatcher;
use crate::ledger::{LedgerError, TransactionLedger};
use crate::nonce::NonceRegistry;
use crate::observer::{BillingEvent, BillingObserver, ObserverRegistry};
use crate::obfuscate::ObfuscationCodec;
use crate::request::{BillingRequest, RequestKind};
use crate::response::ResponseCode;
use crate::signature::{Ed25519Verifier, SignatureError, SignatureVerifier};
use crate::transaction::{PurchaseUpdate, Transaction};

/// Billing support status, as last reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillingStatus {
    /// No support check has completed yet.
    #[default]
    Unknown,
    /// The service reported billing as supported.
    Supported,
    /// The service reported billing as unsupported.
    Unsupported,
}

/// Inbound push from the remote billing service.
///
/// Pushes arrive in any order, any number of times, duplicates included; the
/// controller treats each one on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A purchase notification is available for pickup.
    Notify {
        /// Notification id to fetch purchase information for.
        notification_id: String,
    },
    /// Asynchronous status for a previously sent request.
    ResponseCode {
        /// Correlation id from the original acknowledgment.
        correlation_id: i64,
        /// Raw status code.
        response_code: i64,
    },
    /// Authoritative, signed purchase-state document.
    PurchaseStateChanged {
        /// Raw signed-data string, exactly as signed.
        signed_data: String,
        /// Detached signature; empty when the service sent none.
        signature: String,
    },
}

/// Entry point of the library: issues purchase operations, verifies inbound
/// pushes, and keeps the local ledger consistent with them.
///
/// One controller is constructed per process and owns all component state;
/// nothing here is a process-wide singleton. All methods are callable from
/// any thread.
pub struct BillingController {
    package_name: String,
    debug: bool,
    verifier: Arc<dyn SignatureVerifier>,
    dispatcher: RequestDispatcher,
    correlator: Arc<ResponseCorrelator>,
    nonces: Arc<NonceRegistry>,
    observers: ObserverRegistry,
    ledger: TransactionLedger,
    status: Mutex<BillingStatus>,
    automatic_confirmations: Mutex<HashSet<String>>,
    manual_confirmations: Mutex<HashMap<String, HashSet<String>>>,
    next_start_id: AtomicU64,
}

impl std::fmt::Debug for BillingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingController")
            .field("package_name", &self.package_name)
            .field("debug", &self.debug)
            .finish()
    }
}

impl BillingController {
    /// Creates a controller from `config`, connecting through `connector` and
    /// persisting transactions in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] when no custom verifier is
    /// configured and the configured public key does not parse.
    pub fn new(
        config: BillingConfig,
        connector: Arc<dyn BillingConnector>,
        store: Arc<dyn PurchaseStore>,
    ) -> Result<Self, SignatureError> {
        let verifier: Arc<dyn SignatureVerifier> = match config.signature_verifier {
            Some(verifier) => verifier,
            None => Arc::new(Ed25519Verifier::new(&config.public_key)?),
        };
        let correlator = Arc::new(ResponseCorrelator::new());
        let nonces = Arc::new(NonceRegistry::new());
        let dispatcher =
            RequestDispatcher::new(connector, Arc::clone(&correlator), Arc::clone(&nonces));
        let ledger =
            TransactionLedger::new(store, ObfuscationCodec::new(config.obfuscation_salt));
        Ok(Self {
            package_name: config.package_name,
            debug: config.debug,
            verifier,
            dispatcher,
            correlator,
            nonces,
            observers: ObserverRegistry::new(),
            ledger,
            status: Mutex::new(BillingStatus::default()),
            automatic_confirmations: Mutex::new(HashSet::new()),
            manual_confirmations: Mutex::new(HashMap::new()),
            next_start_id: AtomicU64::new(1),
        })
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Returns the billing support status. While it is still
    /// [`BillingStatus::Unknown`], a support check is issued; observers
    /// eventually receive the answer and later calls return the cached
    /// status.
    pub fn check_billing_supported(&self) -> BillingStatus {
        let status = *lock(&self.status);
        if status == BillingStatus::Unknown {
            self.submit(RequestKind::CheckSupport);
        }
        status
    }

    /// Requests the purchase of `item_id`.
    ///
    /// With `auto_confirm` set, notifications for this item are confirmed as
    /// soon as their verified purchase state arrives; otherwise they
    /// accumulate until [`BillingController::confirm_notifications`] is
    /// called. `developer_payload` travels with the request and comes back
    /// attached to the resulting transaction.
    pub fn request_purchase(
        &self,
        item_id: &str,
        auto_confirm: bool,
        developer_payload: Option<String>,
    ) {
        if auto_confirm {
            lock(&self.automatic_confirmations).insert(item_id.to_owned());
        }
        self.submit(RequestKind::RequestPurchase {
            item_id: item_id.to_owned(),
            developer_payload,
        });
    }

    /// Confirms all notifications currently pending for `item_id`.
    ///
    /// The item's pending set is taken atomically, so concurrent calls split
    /// the work without confirming any notification twice. Returns false when
    /// nothing was pending.
    pub fn confirm_notifications(&self, item_id: &str) -> bool {
        let notify_ids: Vec<String> = {
            let mut manual = lock(&self.manual_confirmations);
            match manual.remove(item_id) {
                Some(pending) if !pending.is_empty() => pending.into_iter().collect(),
                _ => return false,
            }
        };
        self.submit(RequestKind::ConfirmNotifications { notify_ids });
        true
    }

    /// Requests a replay of the account's transaction history. Restored
    /// transactions arrive as ordinary purchase-state pushes; completion is
    /// reported through
    /// [`BillingObserver::on_transactions_restored`].
    pub fn restore_transactions(&self) {
        self.submit(RequestKind::RestoreTransactions);
    }

    // ------------------------------------------------------------------
    // Ledger queries
    // ------------------------------------------------------------------

    /// Lists all locally recorded transactions, including cancellations and
    /// refunds.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the store fails; storage trouble is a
    /// local resource problem and is never swallowed.
    pub fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.ledger.transactions()
    }

    /// Lists the locally recorded transactions of one item.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the store fails.
    pub fn transactions_for(&self, item_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.ledger.transactions_for(item_id)
    }

    /// Counts the recorded purchases of `item_id`. Refunds and cancellations
    /// never decrement the count.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the store fails.
    pub fn count_purchases(&self, item_id: &str) -> Result<usize, LedgerError> {
        self.ledger.count_purchases(item_id)
    }

    /// Returns true when `item_id` has at least one recorded purchase. The
    /// item may have been purchased in another installation and not yet be
    /// recorded here.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the store fails.
    pub fn is_purchased(&self, item_id: &str) -> Result<bool, LedgerError> {
        self.ledger.is_purchased(item_id)
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Registers an observer. Returns false when it was already registered.
    pub fn register_observer(&self, observer: Arc<dyn BillingObserver>) -> bool {
        self.observers.register(observer)
    }

    /// Unregisters an observer. Returns false when it was not registered.
    pub fn unregister_observer(&self, observer: &Arc<dyn BillingObserver>) -> bool {
        self.observers.unregister(observer)
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Delivers the connected channel to the dispatcher, draining anything
    /// queued while disconnected.
    pub fn on_connected(&self, channel: Arc<dyn BillingChannel>) {
        let events = self.dispatcher.on_connected(channel);
        self.dispatch_all(events);
    }

    /// Tells the dispatcher the channel is gone. Queued requests stay queued;
    /// in-flight correlations stay pending for a late push.
    pub fn on_disconnected(&self) {
        self.dispatcher.on_disconnected();
    }

    // ------------------------------------------------------------------
    // Push intake
    // ------------------------------------------------------------------

    /// Routes one inbound push to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when recording a verified purchase state
    /// fails. Authenticity failures never surface here; they are logged and
    /// dropped.
    pub fn handle_push(&self, event: PushEvent) -> Result<(), LedgerError> {
        match event {
            PushEvent::Notify { notification_id } => {
                self.on_notify(&notification_id);
                Ok(())
            }
            PushEvent::ResponseCode {
                correlation_id,
                response_code,
            } => {
                self.on_response_code(correlation_id, response_code);
                Ok(())
            }
            PushEvent::PurchaseStateChanged {
                signed_data,
                signature,
            } => self.on_purchase_state_changed(&signed_data, &signature),
        }
    }

    /// Handles a notification push by requesting the purchase information
    /// behind it.
    pub fn on_notify(&self, notification_id: &str) {
        debug!(notification_id, "purchase notification available");
        self.submit(RequestKind::GetPurchaseInfo {
            notify_ids: vec![notification_id.to_owned()],
        });
    }

    /// Handles an asynchronous response-code push by resolving the pending
    /// request it correlates to. Unknown correlation ids are benign.
    pub fn on_response_code(&self, correlation_id: i64, response_code: i64) {
        let code = ResponseCode::from_code(response_code);
        debug!(correlation_id, %code, "response code received");
        let events = self.correlator.resolve(correlation_id, code);
        self.dispatch_all(events);
    }

    /// Handles an authoritative purchase-state push.
    ///
    /// The document passes three gates before anything else happens: a
    /// signature must be present unless debug mode explicitly bypasses that,
    /// the signature must verify against the configured key, and the embedded
    /// nonce must be one this process issued and not yet consumed. Failing
    /// any gate drops the push with a warning; nothing reaches the ledger or
    /// the observers.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when recording a verified transaction fails.
    pub fn on_purchase_state_changed(
        &self,
        signed_data: &str,
        signature: &str,
    ) -> Result<(), LedgerError> {
        debug!("purchase state changed");
        if signed_data.is_empty() {
            warn!("signed data is empty");
            return Ok(());
        }
        if signature.is_empty() {
            if !self.debug {
                warn!("push without a signature requires debug mode; rejected");
                return Ok(());
            }
        } else if !self.verifier.verify(signed_data, signature) {
            warn!("signature does not match signed data; rejected");
            return Ok(());
        }

        let update = match PurchaseUpdate::parse(signed_data) {
            Ok(update) => update,
            Err(err) => {
                error!(%err, "malformed purchase-state document; rejected");
                return Ok(());
            }
        };
        if !self.nonces.release(update.nonce) {
            warn!(nonce = update.nonce, "unknown nonce; replay rejected");
            return Ok(());
        }

        let mut confirmations = Vec::new();
        for order in update.orders {
            let transaction = Transaction::from(order);
            if let Some(notification_id) = &transaction.notification_id {
                if lock(&self.automatic_confirmations).contains(&transaction.item_id) {
                    confirmations.push(notification_id.clone());
                } else {
                    self.add_manual_confirmation(&transaction.item_id, notification_id);
                }
            }
            self.ledger.record(&transaction)?;
            self.dispatch(&BillingEvent::PurchaseStateChanged {
                item_id: transaction.item_id,
                state: transaction.state,
            });
        }

        if !confirmations.is_empty() {
            self.submit(RequestKind::ConfirmNotifications {
                notify_ids: confirmations,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Builds a request for `kind`, allocating a nonce when the operation
    /// carries one, and hands it to the dispatcher.
    fn submit(&self, kind: RequestKind) {
        let start_id = self.next_start_id.fetch_add(1, Ordering::Relaxed);
        let mut request = BillingRequest::new(kind, &self.package_name, start_id);
        if request.kind().requires_nonce() {
            request.set_nonce(self.nonces.issue());
        }
        let events = self.dispatcher.submit(request);
        self.dispatch_all(events);
    }

    fn add_manual_confirmation(&self, item_id: &str, notification_id: &str) {
        lock(&self.manual_confirmations)
            .entry(item_id.to_owned())
            .or_default()
            .insert(notification_id.to_owned());
    }

    fn dispatch_all(&self, events: Vec<BillingEvent>) {
        for event in events {
            self.dispatch(&event);
        }
    }

    /// Applies an event to controller state, then fans it out.
    fn dispatch(&self, event: &BillingEvent) {
        if let BillingEvent::SupportChecked { supported } = event {
            *lock(&self.status) = if *supported {
                BillingStatus::Supported
            } else {
                BillingStatus::Unsupported
            };
        }
        self.observers.dispatch(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use billingkit_db::MemoryStore;

    use super::{BillingController, BillingStatus};
    use crate::channel::{BillingConnector, ChannelError};
    use crate::config::BillingConfig;

    struct IdleConnector;

    impl BillingConnector for IdleConnector {
        fn connect(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn controller(config: BillingConfig) -> BillingController {
        BillingController::new(config, Arc::new(IdleConnector), Arc::new(MemoryStore::new()))
            .unwrap()
    }

    #[test]
    fn rejects_malformed_public_keys() {
        let config = BillingConfig::new("pkg", "not a key");
        assert!(
            BillingController::new(config, Arc::new(IdleConnector), Arc::new(MemoryStore::new()))
                .is_err()
        );
    }

    #[test]
    fn custom_verifiers_skip_key_parsing() {
        struct AcceptAll;
        impl crate::signature::SignatureVerifier for AcceptAll {
            fn verify(&self, _signed_data: &str, _signature: &str) -> bool {
                true
            }
        }

        let mut config = BillingConfig::new("pkg", "not a key");
        config.signature_verifier = Some(Arc::new(AcceptAll));
        controller(config);
    }

    #[test]
    fn support_status_starts_unknown() {
        let mut config = BillingConfig::new("pkg", "");
        config.signature_verifier = Some(Arc::new(RejectAll));
        let controller = controller(config);
        assert_eq!(controller.check_billing_supported(), BillingStatus::Unknown);
    }

    struct RejectAll;
    impl crate::signature::SignatureVerifier for RejectAll {
        fn verify(&self, _signed_data: &str, _signature: &str) -> bool {
            false
        }
    }

    #[test]
    fn confirm_notifications_without_pending_work_reports_false() {
        let mut config = BillingConfig::new("pkg", "");
        config.signature_verifier = Some(Arc::new(RejectAll));
        let controller = controller(config);
        assert!(!controller.confirm_notifications("sku-a"));
    }
}
