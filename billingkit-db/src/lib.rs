//! Durable purchase-table seam for billingkit.
//!
//! The physical persistence engine is an external collaborator: this crate
//! defines the capability traits a store implementation must provide
//! ([`PurchaseStore`] / [`StoreSession`]), the at-rest record they exchange
//! ([`PurchaseRow`]), and the error type store failures surface as
//! ([`DbError`]). A [`MemoryStore`] reference implementation backs the test
//! suites and works as a default for hosts without durable storage.
//!
//! Consumers acquire the store in a scope: [`PurchaseStore::open`] yields a
//! session, every read or write goes through it, and dropping the session
//! closes the store again on every exit path.

mod error;
mod memory;
mod row;
mod store;

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use row::PurchaseRow;
pub use store::{PurchaseStore, StoreSession};

#[cfg(test)]
mod tests;
