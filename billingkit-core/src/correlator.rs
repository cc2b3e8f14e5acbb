//! Matching asynchronous responses back to the requests that caused them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::observer::BillingEvent;
use crate::request::BillingRequest;
use crate::response::ResponseCode;

/// Maps server-issued correlation ids to originating requests.
///
/// A record is created when a send succeeds and yields a correlation id, and
/// removed exactly once when the matching response-code event arrives. There
/// is deliberately no timeout-driven eviction: a pending record whose push
/// never arrives (remote crash, process restart on the far side) stays until
/// this process ends, matching the tolerated-loss model of the protocol.
#[derive(Debug, Default)]
pub struct ResponseCorrelator {
    pending: Mutex<HashMap<i64, BillingRequest>>,
}

impl ResponseCorrelator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a successfully sent request under its correlation id.
    pub fn register_pending(&self, correlation_id: i64, request: BillingRequest) {
        debug!(
            correlation_id,
            request = request.kind().tag(),
            "request awaiting asynchronous response"
        );
        self.lock().insert(correlation_id, request);
    }

    /// Resolves a response-code event: removes the pending record and invokes
    /// its response handling, returning the events it produced.
    ///
    /// An id with no matching record (late, duplicate, or lost to a restart)
    /// is benign and yields no events.
    pub fn resolve(&self, correlation_id: i64, code: ResponseCode) -> Vec<BillingEvent> {
        let Some(request) = self.lock().remove(&correlation_id) else {
            debug!(correlation_id, "response for unknown correlation id; ignoring");
            return Vec::new();
        };
        request.on_response_code(code)
    }

    /// Number of requests still awaiting their asynchronous response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, BillingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
