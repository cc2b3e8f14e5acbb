//! Pending request queue and the channel connection state machine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::channel::{BillingChannel, BillingConnector};
use crate::correlator::ResponseCorrelator;
use crate::nonce::NonceRegistry;
use crate::observer::BillingEvent;
use crate::request::{BillingRequest, IGNORE_REQUEST_ID};

/// Connection to the remote billing service, as the dispatcher sees it.
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(Arc<dyn BillingChannel>),
}

struct DispatcherInner {
    state: ConnectionState,
    queue: VecDeque<BillingRequest>,
    draining: bool,
}

/// Owns the channel connection and the outbound request queue.
///
/// Requests submitted while disconnected are queued and drained in submission
/// order once the connection is up. Only one drain runs at a time; submissions
/// from other threads interleave with an in-progress drain without reordering
/// already-queued requests.
pub struct RequestDispatcher {
    inner: Mutex<DispatcherInner>,
    connector: Arc<dyn BillingConnector>,
    correlator: Arc<ResponseCorrelator>,
    nonces: Arc<NonceRegistry>,
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("queued", &self.lock().queue.len())
            .finish()
    }
}

impl RequestDispatcher {
    /// Creates a disconnected dispatcher.
    #[must_use]
    pub fn new(
        connector: Arc<dyn BillingConnector>,
        correlator: Arc<ResponseCorrelator>,
        nonces: Arc<NonceRegistry>,
    ) -> Self {
        Self {
            inner: Mutex::new(DispatcherInner {
                state: ConnectionState::Disconnected,
                queue: VecDeque::new(),
                draining: false,
            }),
            connector,
            correlator,
            nonces,
        }
    }

    /// Appends `request` to the queue and, depending on the connection state,
    /// starts a connection attempt or drains immediately.
    ///
    /// Returns the events produced by any requests sent during an immediate
    /// drain.
    pub fn submit(&self, request: BillingRequest) -> Vec<BillingEvent> {
        let mut inner = self.lock();
        debug!(
            request = request.kind().tag(),
            start_id = request.start_id(),
            "request queued"
        );
        inner.queue.push_back(request);
        if matches!(inner.state, ConnectionState::Connected(_)) {
            drop(inner);
            return self.drain();
        }
        if matches!(inner.state, ConnectionState::Connecting) {
            // An attempt is already under way; the queued request rides along.
            return Vec::new();
        }
        inner.state = ConnectionState::Connecting;
        drop(inner);

        debug!("binding to the remote billing service");
        if let Err(err) = self.connector.connect() {
            warn!(%err, "could not start a connection to the billing service");
            self.lock().state = ConnectionState::Disconnected;
        }
        Vec::new()
    }

    /// Called by the host once the transport finished connecting. Drains the
    /// queue and returns the events produced by the sent requests.
    pub fn on_connected(&self, channel: Arc<dyn BillingChannel>) -> Vec<BillingEvent> {
        debug!("billing service connected");
        self.lock().state = ConnectionState::Connected(channel);
        self.drain()
    }

    /// Called by the host on channel teardown, whether an orderly unbind or a
    /// remote crash. Requests still queued stay queued for the next
    /// connection; requests already sent stay pending in the correlator, since
    /// a late push may still arrive.
    pub fn on_disconnected(&self) {
        debug!("billing service disconnected");
        self.lock().state = ConnectionState::Disconnected;
    }

    /// Sends queued requests in FIFO order while the channel stays usable.
    fn drain(&self) -> Vec<BillingEvent> {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            if inner.draining {
                return events;
            }
            inner.draining = true;
        }
        loop {
            let (channel, request) = {
                let mut inner = self.lock();
                let ConnectionState::Connected(channel) = &inner.state else {
                    inner.draining = false;
                    return events;
                };
                let channel = Arc::clone(channel);
                let Some(request) = inner.queue.pop_front() else {
                    inner.draining = false;
                    return events;
                };
                (channel, request)
            };
            self.send_one(channel.as_ref(), request, &mut events);
        }
    }

    /// Performs one round trip. A request the transport rejects is dropped
    /// with a warning and is not re-queued; its nonce, if any, is released so
    /// the registry does not accumulate orphans.
    fn send_one(
        &self,
        channel: &dyn BillingChannel,
        mut request: BillingRequest,
        events: &mut Vec<BillingEvent>,
    ) {
        let payload = request.build_payload();
        let ack = match channel.send(&payload) {
            Ok(ack) => ack,
            Err(err) => {
                warn!(
                    request = request.kind().tag(),
                    %err,
                    "send failed; dropping request"
                );
                if let Some(nonce) = request.nonce() {
                    self.nonces.release(nonce);
                }
                return;
            }
        };
        let request_id = request.handle_ack(&ack, events);
        self.on_request_sent(request_id, request);
    }

    /// Registers a successful send with the correlator, or releases the nonce
    /// of a request whose acknowledgment failed validation.
    fn on_request_sent(&self, request_id: i64, request: BillingRequest) {
        if request.is_success() {
            if request_id == IGNORE_REQUEST_ID {
                // Nothing to correlate; a nonce-carrying request keeps its
                // nonce registered because the signed push may still arrive.
                debug!(
                    request = request.kind().tag(),
                    "acknowledgment carried no correlation id"
                );
            } else {
                self.correlator.register_pending(request_id, request);
            }
        } else if let Some(nonce) = request.nonce() {
            self.nonces.release(nonce);
        }
    }

    fn lock(&self) -> MutexGuard<'_, DispatcherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
