//! Eternal Ledger storage abstractions.
//!
//! The registry keeps four logical tables behind this contract:
//! - registry metadata (owner, creation time), written once
//! - the registrar authorization set
//! - identity bindings (identifier <-> account, both unique)
//! - lifecycle tokens, plus an append-only hash-linked event log
//!
//! Every mutation goes through [`CommitStore::commit`], which applies the state
//! change and appends its event as one atomic unit. Adapters re-check the
//! uniqueness invariants themselves, so a caller that skips validation still
//! cannot corrupt the tables.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod chain;
mod error;
pub mod memory;
mod model;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use chain::{compute_event_hash, verify_event_chain};
pub use error::{StorageError, StorageResult};
pub use model::{CommitReceipt, LedgerMutation, TokenSummary};
pub use traits::{
    CommitStore, EventStore, IdentityStore, LedgerStorage, MetadataStore, QueryWindow,
    RegistrarStore, TokenStore,
};
