//! Transport seam to the remote billing service.
//!
//! The concrete RPC binding is an external collaborator. The library talks to
//! it through two capabilities: [`BillingConnector`] starts an asynchronous
//! bind whose completion the host later delivers to the controller, and
//! [`BillingChannel`] represents one bound connection able to perform
//! synchronous request/acknowledgment round trips.

use thiserror::Error;

/// Key→value payload exchanged with the remote service, in both directions.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by the transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The asynchronous connection attempt could not be started.
    #[error("connect failed: {0}")]
    Connect(String),
    /// A send did not reach the remote service.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// One bound connection to the remote billing service.
pub trait BillingChannel: Send + Sync {
    /// Sends one request payload and returns the acknowledgment payload.
    ///
    /// This is a single synchronous round trip; it blocks no longer than the
    /// transport's own timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] when the request did not reach the
    /// remote service.
    fn send(&self, request: &Payload) -> Result<Payload, ChannelError>;
}

/// Initiates connections to the remote billing service.
///
/// `connect` only starts the bind. When the transport finishes connecting,
/// the host calls [`BillingController::on_connected`] with the resulting
/// channel; teardown arrives as [`BillingController::on_disconnected`].
///
/// [`BillingController::on_connected`]: crate::BillingController::on_connected
/// [`BillingController::on_disconnected`]: crate::BillingController::on_disconnected
pub trait BillingConnector: Send + Sync {
    /// Starts an asynchronous connection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] when the attempt could not be
    /// started at all.
    fn connect(&self) -> Result<(), ChannelError>;
}
