//! # eternal-ledger
//!
//! Identity & lifecycle registry. A fixed owner authorizes registrars;
//! registrars bind external identifiers to accounts (once, both sides unique)
//! and record deaths, each of which mints exactly one soulbound lifecycle
//! token owned by the bound account.
//!
//! ## Components
//!
//! - **Authorization**: owner-gated registrar set (`authorize_registrar`, `revoke_registrar`)
//! - **Binding**: one-time identifier <-> account pairing (`bind_identity`)
//! - **Death recording**: at-most-once minting per identifier (`record_death`);
//!   transfers and approvals always fail
//! - **Views**: read-only snapshots (`is_deceased`, `get_all_deceased`, `get_death_statistics`, ...)
//!
//! Mutations are serialized and applied atomically through the storage
//! commit path; each successful one is appended to a hash-linked event log
//! and then broadcast to subscribers.
//!
//! ```no_run
//! # async fn demo() -> Result<(), eternal_ledger::RegistryError> {
//! use eternal_ledger::{AccountId, ContentReference, EternalLedger, Identifier};
//!
//! let owner = AccountId::new("0xowner");
//! let hospital = AccountId::new("0xhospital");
//! let ledger = EternalLedger::new(owner.clone()).await?;
//!
//! ledger.authorize_registrar(&owner, &hospital).await?;
//! ledger
//!     .bind_identity(&hospital, &Identifier::new("S1234567A"), &AccountId::new("0xalice"))
//!     .await?;
//! let token = ledger
//!     .record_death(&hospital, &Identifier::new("S1234567A"), &ContentReference::new("bafkreiexample111"))
//!     .await?;
//! assert_eq!(token.token_id.0, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod authorization;
mod binding;
pub mod config;
mod death;
pub mod error;
mod ledger;
pub mod notify;
mod views;

pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult, Role};
pub use ledger::EternalLedger;
pub use notify::Notifier;

pub use eternal_ledger_storage::{QueryWindow, StorageError};
pub use eternal_ledger_types::{
    AccountId, ContentReference, DeathRecord, DeathStatistics, EventRecord, Identifier,
    IdentityBinding, LedgerEvent, RegistrarEntry, RegistryMetadata, TokenId,
};
