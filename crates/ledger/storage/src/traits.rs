use crate::model::{CommitReceipt, LedgerMutation, TokenSummary};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eternal_ledger_types::{
    AccountId, DeathRecord, EventRecord, Identifier, IdentityBinding, RegistrarEntry,
    RegistryMetadata, TokenId,
};

/// Generic query window for paged reads. A `limit` of 0 means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Registry owner and creation time.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write metadata if absent and return what is stored. Reinitializing an
    /// existing store keeps the original owner and creation time.
    async fn initialize(
        &self,
        owner: AccountId,
        created_at: DateTime<Utc>,
    ) -> StorageResult<RegistryMetadata>;

    async fn metadata(&self) -> StorageResult<Option<RegistryMetadata>>;
}

#[async_trait]
pub trait RegistrarStore: Send + Sync {
    async fn is_registrar(&self, account: &AccountId) -> StorageResult<bool>;

    /// Every account ever authorized or revoked, ordered by account.
    async fn list_registrars(&self, window: QueryWindow) -> StorageResult<Vec<RegistrarEntry>>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn binding_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<IdentityBinding>>;

    async fn binding_by_account(
        &self,
        account: &AccountId,
    ) -> StorageResult<Option<IdentityBinding>>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token(&self, token_id: TokenId) -> StorageResult<Option<DeathRecord>>;

    async fn token_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<DeathRecord>>;

    async fn token_by_owner(&self, owner: &AccountId) -> StorageResult<Option<DeathRecord>>;

    /// Tokens in ascending id order.
    async fn list_tokens(&self, window: QueryWindow) -> StorageResult<Vec<DeathRecord>>;

    async fn token_summary(&self) -> StorageResult<TokenSummary>;
}

/// Append-only, hash-linked notification log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events oldest-first.
    async fn list_events(&self, window: QueryWindow) -> StorageResult<Vec<EventRecord>>;

    /// Hash of the newest event, `None` while the log is empty.
    async fn latest_event_hash(&self) -> StorageResult<Option<String>>;
}

/// Atomic write path for every registry mutation.
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Apply `mutation` and append its event in one unit. Returns
    /// `Conflict` when a uniqueness constraint would be violated and
    /// `InvariantViolation` when a mint targets an unbound identifier.
    async fn commit(
        &self,
        mutation: LedgerMutation,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<CommitReceipt>;
}

/// Unified storage bundle used by the registry.
pub trait LedgerStorage:
    MetadataStore + RegistrarStore + IdentityStore + TokenStore + EventStore + CommitStore + Send + Sync
{
}

impl<T> LedgerStorage for T where
    T: MetadataStore
        + RegistrarStore
        + IdentityStore
        + TokenStore
        + EventStore
        + CommitStore
        + Send
        + Sync
{
}
