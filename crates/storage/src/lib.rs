//! Dispatch storage — the Request State Store contract.
//!
//! A [`RequestStore`] implementation provides durable storage for service
//! requests and their append-only transition history. The engine owns
//! atomicity (it records forward operations with inverses and rolls back on
//! failure); the store contributes optimistic concurrency control via a
//! per-request version and strict per-request ordering of transitions.
//!
//! The crate ships an in-memory reference backend ([`MemoryStore`]) and a
//! backend-agnostic [`conformance`] suite that any implementation can run.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemoryStore, StoreSnapshot};
pub use record::{RequestFilter, RequestRecord, TransitionRecord};
pub use traits::RequestStore;
