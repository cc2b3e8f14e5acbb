//! Shared fakes for the end-to-end billing flow tests: a scripted channel, a
//! counting connector, a recording observer, and signed-document builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use billingkit_core::{
    wire, BillingChannel, BillingConfig, BillingConnector, BillingObserver, ChannelError, Payload,
    PurchaseState, ResponseCode,
};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

/// Channel that records every sent payload and answers with scripted
/// acknowledgments, falling back to OK with a sequential correlation id.
pub struct ScriptedChannel {
    acks: Mutex<VecDeque<Result<Payload, ChannelError>>>,
    pub sent: Mutex<Vec<Payload>>,
    next_id: AtomicI64,
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            acks: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
        }
    }

    /// Queues the acknowledgment for the next send.
    pub fn enqueue_ack(&self, ack: Result<Payload, ChannelError>) {
        self.acks.lock().unwrap().push_back(ack);
    }

    /// Operation tags of every payload sent so far, in order.
    pub fn sent_tags(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|payload| {
                payload[wire::KEY_BILLING_REQUEST]
                    .as_str()
                    .unwrap()
                    .to_owned()
            })
            .collect()
    }

    /// The nonce carried by the `index`-th sent payload.
    pub fn sent_nonce(&self, index: usize) -> u64 {
        self.sent.lock().unwrap()[index][wire::KEY_NONCE]
            .as_u64()
            .unwrap()
    }

    /// The notification ids carried by the `index`-th sent payload.
    pub fn sent_notify_ids(&self, index: usize) -> Vec<String> {
        self.sent.lock().unwrap()[index][wire::KEY_NOTIFY_IDS]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| id.as_str().unwrap().to_owned())
            .collect()
    }
}

impl BillingChannel for ScriptedChannel {
    fn send(&self, request: &Payload) -> Result<Payload, ChannelError> {
        self.sent.lock().unwrap().push(request.clone());
        self.acks.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(ok_ack(self.next_id.fetch_add(1, Ordering::SeqCst), None))
        })
    }
}

/// Builds an OK acknowledgment with the given correlation id and, for
/// purchase requests, an intent handle.
pub fn ok_ack(request_id: i64, intent: Option<&str>) -> Payload {
    let mut ack = Payload::new();
    ack.insert(wire::KEY_RESPONSE_CODE.to_owned(), json!(0));
    ack.insert(wire::KEY_REQUEST_ID.to_owned(), json!(request_id));
    if let Some(intent) = intent {
        ack.insert(wire::KEY_PURCHASE_INTENT.to_owned(), json!(intent));
    }
    ack
}

/// Builds an acknowledgment rejecting the request with `code`.
pub fn ack_with_code(code: i64) -> Payload {
    let mut ack = Payload::new();
    ack.insert(wire::KEY_RESPONSE_CODE.to_owned(), json!(code));
    ack
}

/// Connector that counts connection attempts and always reports success; the
/// test drives the actual `on_connected` callback.
#[derive(Default)]
pub struct CountingConnector {
    pub attempts: AtomicUsize,
}

impl BillingConnector for CountingConnector {
    fn connect(&self) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer that records every callback as a formatted line.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, line: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| *event == line)
            .count()
    }
}

impl BillingObserver for RecordingObserver {
    fn on_check_support_response(&self, supported: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("support:{supported}"));
    }

    fn on_purchase_intent_ready(&self, item_id: &str, intent: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("intent:{item_id}:{intent}"));
    }

    fn on_purchase_intent_failure(&self, item_id: &str, code: ResponseCode) {
        self.events
            .lock()
            .unwrap()
            .push(format!("intent-failure:{item_id}:{code}"));
    }

    fn on_purchase_state_changed(&self, item_id: &str, state: PurchaseState) {
        self.events
            .lock()
            .unwrap()
            .push(format!("state:{item_id}:{state}"));
    }

    fn on_request_purchase_response(&self, item_id: &str, code: ResponseCode) {
        self.events
            .lock()
            .unwrap()
            .push(format!("response:{item_id}:{code}"));
    }

    fn on_transactions_restored(&self) {
        self.events.lock().unwrap().push("restored".to_owned());
    }
}

/// Installs a terse subscriber so the warnings logged for rejected pushes
/// show up under `cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic service signing key for the tests.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// A key the configured verifier does not trust.
pub fn foreign_key() -> SigningKey {
    SigningKey::from_bytes(&[13u8; 32])
}

pub fn public_key_base64(key: &SigningKey) -> String {
    BASE64.encode(key.verifying_key().as_bytes())
}

/// Signs `signed_data` and returns the base64 signature string.
pub fn sign(key: &SigningKey, signed_data: &str) -> String {
    BASE64.encode(key.sign(signed_data.as_bytes()).to_bytes())
}

/// One order entry of a signed purchase-state document.
pub fn order(
    notification_id: Option<&str>,
    order_id: &str,
    item_id: &str,
    state: PurchaseState,
) -> Value {
    let mut order = json!({
        "orderId": order_id,
        "productId": item_id,
        "purchaseTime": 1_700_000_000_000_i64,
        "purchaseState": state.code(),
        "developerPayload": "attached",
    });
    if let Some(notification_id) = notification_id {
        order["notificationId"] = json!(notification_id);
    }
    order
}

/// The raw signed-data string of a purchase-state document.
pub fn signed_document(nonce: u64, orders: &[Value]) -> String {
    json!({ "nonce": nonce, "orders": orders }).to_string()
}

/// Configuration trusting [`signing_key`], with obfuscation enabled.
pub fn test_config() -> BillingConfig {
    let mut config = BillingConfig::new("com.example.app", public_key_base64(&signing_key()));
    config.obfuscation_salt = Some(b"0123456789abcdefghij".to_vec());
    config
}
