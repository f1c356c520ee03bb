//! Persistence for carts, the inventory ledger and orders.
//!
//! [`CommerceStore`] is the single seam between the workflow and storage.
//! Every method is one atomic unit: either all of its writes land or none do.
//! Two backends are provided: [`InMemoryStore`] for tests and local runs, and
//! [`PostgresStore`], which relies on row locks for its concurrency guarantees.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CommerceStore, CommerceStoreExt};
