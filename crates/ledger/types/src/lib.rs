//! Eternal Ledger Types - the vocabulary shared by storage and the registry
#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account address (wallet) known to the registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);
impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External, registrar-supplied identifier (e.g. a national ID number).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub String);
impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque pointer to off-registry evidentiary metadata (typically an IPFS CID).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentReference(pub String);
impl ContentReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for ContentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential lifecycle token number.
///
/// Minted ids start at 1. `TokenId::NONE` (0) is the sentinel returned by
/// lookups for identifiers that are unbound or still alive.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(pub u64);
impl TokenId {
    pub const NONE: TokenId = TokenId(0);
    pub const FIRST: TokenId = TokenId(1);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner and creation time, fixed when a registry is first initialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub owner: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarEntry {
    pub account: AccountId,
    pub authorized: bool,
}

/// One identifier bound to one account. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBinding {
    pub identifier: Identifier,
    pub account: AccountId,
    pub bound_by: AccountId,
    pub bound_at: DateTime<Utc>,
}

/// The soulbound record minted when a death is recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub token_id: TokenId,
    pub identifier: Identifier,
    pub owner: AccountId,
    pub content_reference: ContentReference,
    pub recorded_by: AccountId,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view derived from the token set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathStatistics {
    pub total: u64,
    pub oldest_token_id: TokenId,
    pub newest_token_id: TokenId,
    pub registry_created_at: DateTime<Utc>,
}
impl DeathStatistics {
    pub fn empty(registry_created_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            oldest_token_id: TokenId::NONE,
            newest_token_id: TokenId::NONE,
            registry_created_at,
        }
    }
}

/// Notifications emitted by successful registry mutations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    RegistrarAuthorized {
        account: AccountId,
    },
    RegistrarRevoked {
        account: AccountId,
    },
    IdentityBound {
        identifier: Identifier,
        account: AccountId,
    },
    DeathRecorded {
        identifier: Identifier,
        token_id: TokenId,
        content_reference: ContentReference,
    },
}
impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::RegistrarAuthorized { .. } => "registrar_authorized",
            LedgerEvent::RegistrarRevoked { .. } => "registrar_revoked",
            LedgerEvent::IdentityBound { .. } => "identity_bound",
            LedgerEvent::DeathRecorded { .. } => "death_recorded",
        }
    }
}

/// A persisted notification, sequence-numbered and hash-linked to its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: LedgerEvent,
    pub previous_hash: Option<String>,
    pub hash: String,
}
