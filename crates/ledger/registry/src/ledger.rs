use std::sync::Arc;

use chrono::{DateTime, Utc};
use eternal_ledger_storage::memory::InMemoryLedgerStorage;
use eternal_ledger_storage::{CommitReceipt, LedgerMutation, LedgerStorage};
use eternal_ledger_types::{
    AccountId, ContentReference, EventRecord, Identifier, RegistryMetadata,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult, Role};
use crate::notify::Notifier;

/// The identity & lifecycle registry.
///
/// Holds an injectable storage handle; share it across tasks behind an `Arc`.
/// Mutations take the commit gate for their whole validate-then-commit span,
/// giving every mutation a single global order. Views never take the gate.
pub struct EternalLedger {
    pub(crate) storage: Arc<dyn LedgerStorage>,
    pub(crate) metadata: RegistryMetadata,
    pub(crate) notifier: Notifier,
    pub(crate) commit_gate: Mutex<()>,
}

impl EternalLedger {
    /// Create a registry owned by `owner`, backed by in-memory storage.
    pub async fn new(owner: AccountId) -> RegistryResult<Self> {
        Self::with_storage(
            Arc::new(InMemoryLedgerStorage::new()),
            owner,
            RegistryConfig::default(),
        )
        .await
    }

    /// Open a registry over an explicit storage adapter.
    ///
    /// A store that was already initialized keeps its original owner and
    /// creation time; `owner` only applies to a fresh store.
    pub async fn with_storage(
        storage: Arc<dyn LedgerStorage>,
        owner: AccountId,
        config: RegistryConfig,
    ) -> RegistryResult<Self> {
        let owner = normalize_account(&owner)?;
        let metadata = storage.initialize(owner.clone(), Utc::now()).await?;
        if metadata.owner != owner {
            warn!(
                requested = %owner,
                owner = %metadata.owner,
                "Store already initialized; keeping original owner"
            );
        }

        info!(
            owner = %metadata.owner,
            created_at = %metadata.created_at,
            "Eternal ledger opened"
        );

        Ok(Self {
            storage,
            metadata,
            notifier: Notifier::new(config.event_capacity),
            commit_gate: Mutex::new(()),
        })
    }

    /// Access the underlying storage backend.
    pub fn storage(&self) -> Arc<dyn LedgerStorage> {
        Arc::clone(&self.storage)
    }

    /// The account allowed to manage registrars. Fixed at creation.
    pub fn owner(&self) -> &AccountId {
        &self.metadata.owner
    }

    /// When the underlying store was first initialized.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.notifier.subscribe()
    }

    /// Apply a validated mutation, then notify. Callers hold the commit gate.
    pub(crate) async fn commit(&self, mutation: LedgerMutation) -> RegistryResult<CommitReceipt> {
        let kind = mutation.kind();
        let receipt = self.storage.commit(mutation, Utc::now()).await?;
        debug!(
            kind,
            sequence = receipt.event.sequence,
            hash = %receipt.event.hash,
            "Mutation committed"
        );
        self.notifier.publish(receipt.event.clone());
        Ok(receipt)
    }

    pub(crate) fn ensure_owner(&self, caller: &AccountId) -> RegistryResult<()> {
        if caller_key(caller) == self.metadata.owner {
            Ok(())
        } else {
            warn!(caller = %caller, "Rejected owner-only call");
            Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                required: Role::Owner,
            })
        }
    }

    pub(crate) async fn ensure_registrar(&self, caller: &AccountId) -> RegistryResult<()> {
        if self.storage.is_registrar(&caller_key(caller)).await? {
            Ok(())
        } else {
            warn!(caller = %caller, "Rejected registrar-only call");
            Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                required: Role::Registrar,
            })
        }
    }
}

pub(crate) fn caller_key(caller: &AccountId) -> AccountId {
    AccountId::new(caller.as_str().trim())
}

pub(crate) fn normalize_account(account: &AccountId) -> RegistryResult<AccountId> {
    let trimmed = account.as_str().trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput(
            "account must not be empty".to_string(),
        ));
    }
    Ok(AccountId::new(trimmed))
}

pub(crate) fn normalize_identifier(identifier: &Identifier) -> RegistryResult<Identifier> {
    let trimmed = identifier.as_str().trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(Identifier::new(trimmed))
}

pub(crate) fn normalize_content_reference(
    reference: &ContentReference,
) -> RegistryResult<ContentReference> {
    let trimmed = reference.as_str().trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput(
            "content reference must not be empty".to_string(),
        ));
    }
    Ok(ContentReference::new(trimmed))
}

/// Lookup key for views: malformed input simply matches nothing.
pub(crate) fn identifier_key(identifier: &Identifier) -> Option<Identifier> {
    normalize_identifier(identifier).ok()
}

pub(crate) fn account_key(account: &AccountId) -> Option<AccountId> {
    normalize_account(account).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reopening_a_store_keeps_the_first_owner() {
        let storage: Arc<dyn LedgerStorage> = Arc::new(InMemoryLedgerStorage::new());
        let first = EternalLedger::with_storage(
            Arc::clone(&storage),
            AccountId::new("0xowner"),
            RegistryConfig::default(),
        )
        .await
        .unwrap();
        let second = EternalLedger::with_storage(
            storage,
            AccountId::new("0xother"),
            RegistryConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(second.owner(), &AccountId::new("0xowner"));
        assert_eq!(second.created_at(), first.created_at());
    }

    #[tokio::test]
    async fn empty_owner_is_rejected() {
        let result = EternalLedger::new(AccountId::new("   ")).await;
        assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
    }

    #[test]
    fn normalization_trims_and_rejects_blank() {
        assert_eq!(
            normalize_identifier(&Identifier::new("  S1234567A ")).unwrap(),
            Identifier::new("S1234567A")
        );
        assert!(normalize_content_reference(&ContentReference::new("")).is_err());
        assert!(identifier_key(&Identifier::new("\t")).is_none());
    }
}
