//! Request-dispatch and verification core of a purchase-client library.
//!
//! The library talks to a privileged, out-of-process billing service over a
//! connection-oriented channel. Every operation has two response paths: the
//! synchronous acknowledgment of the send itself, carrying a server-issued
//! correlation id and a coarse status code, and a later, out-of-band push
//! carrying the authoritative, signed purchase state.
//!
//! [`BillingController`] is the entry point. It queues requests while the
//! channel is down and drains them in order once it is up, matches
//! asynchronous responses back to their requests by correlation id, gates
//! purchase-state pushes behind signature and single-use-nonce checks, keeps
//! an obfuscated durable ledger of verified transactions, and fans verified
//! events out to registered [`BillingObserver`]s.
//!
//! The host supplies the transport ([`BillingConnector`] / [`BillingChannel`])
//! and the durable row store (`billingkit-db`'s `PurchaseStore`); both are
//! capability traits, so the concrete RPC binding and persistence engine stay
//! out of this crate.

mod channel;
pub use channel::*;

mod config;
pub use config::*;

mod controller;
pub use controller::*;

mod correlator;
pub use correlator::*;

mod dispatcher;
pub use dispatcher::*;

mod ledger;
pub use ledger::*;

mod nonce;
pub use nonce::*;

mod observer;
pub use observer::*;

mod obfuscate;
pub use obfuscate::*;

mod request;
pub use request::*;

mod response;
pub use response::*;

mod signature;
pub use signature::*;

mod transaction;
pub use transaction::*;
