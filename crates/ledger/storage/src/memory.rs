//! In-memory reference implementation of the ledger storage traits.
//!
//! All tables live behind a single lock so every view reads one consistent
//! state and every commit is applied whole. Use the SQLite adapter when the
//! registry has to survive a restart.

use crate::chain::compute_event_hash;
use crate::model::{CommitReceipt, LedgerMutation, TokenSummary};
use crate::traits::{
    CommitStore, EventStore, IdentityStore, MetadataStore, QueryWindow, RegistrarStore,
    TokenStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eternal_ledger_types::{
    AccountId, DeathRecord, EventRecord, Identifier, IdentityBinding, RegistrarEntry,
    RegistryMetadata, TokenId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    metadata: Option<RegistryMetadata>,
    registrars: BTreeMap<AccountId, bool>,
    bindings: HashMap<Identifier, IdentityBinding>,
    account_index: HashMap<AccountId, Identifier>,
    tokens: BTreeMap<TokenId, DeathRecord>,
    token_index: HashMap<Identifier, TokenId>,
    last_token_id: TokenId,
    events: Vec<EventRecord>,
}

/// In-memory ledger storage adapter.
#[derive(Default)]
pub struct InMemoryLedgerStorage {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| StorageError::Backend("ledger state lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| StorageError::Backend("ledger state lock poisoned".to_string()))
    }
}

#[async_trait]
impl MetadataStore for InMemoryLedgerStorage {
    async fn initialize(
        &self,
        owner: AccountId,
        created_at: DateTime<Utc>,
    ) -> StorageResult<RegistryMetadata> {
        let mut guard = self.write()?;
        let metadata = guard
            .metadata
            .get_or_insert_with(|| RegistryMetadata { owner, created_at });
        Ok(metadata.clone())
    }

    async fn metadata(&self) -> StorageResult<Option<RegistryMetadata>> {
        Ok(self.read()?.metadata.clone())
    }
}

#[async_trait]
impl RegistrarStore for InMemoryLedgerStorage {
    async fn is_registrar(&self, account: &AccountId) -> StorageResult<bool> {
        Ok(self
            .read()?
            .registrars
            .get(account)
            .copied()
            .unwrap_or(false))
    }

    async fn list_registrars(&self, window: QueryWindow) -> StorageResult<Vec<RegistrarEntry>> {
        let guard = self.read()?;
        let values = guard
            .registrars
            .iter()
            .map(|(account, authorized)| RegistrarEntry {
                account: account.clone(),
                authorized: *authorized,
            })
            .collect();
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl IdentityStore for InMemoryLedgerStorage {
    async fn binding_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<IdentityBinding>> {
        Ok(self.read()?.bindings.get(identifier).cloned())
    }

    async fn binding_by_account(
        &self,
        account: &AccountId,
    ) -> StorageResult<Option<IdentityBinding>> {
        let guard = self.read()?;
        Ok(guard
            .account_index
            .get(account)
            .and_then(|identifier| guard.bindings.get(identifier))
            .cloned())
    }
}

#[async_trait]
impl TokenStore for InMemoryLedgerStorage {
    async fn token(&self, token_id: TokenId) -> StorageResult<Option<DeathRecord>> {
        Ok(self.read()?.tokens.get(&token_id).cloned())
    }

    async fn token_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<DeathRecord>> {
        let guard = self.read()?;
        Ok(guard
            .token_index
            .get(identifier)
            .and_then(|token_id| guard.tokens.get(token_id))
            .cloned())
    }

    async fn token_by_owner(&self, owner: &AccountId) -> StorageResult<Option<DeathRecord>> {
        let guard = self.read()?;
        Ok(guard
            .account_index
            .get(owner)
            .and_then(|identifier| guard.token_index.get(identifier))
            .and_then(|token_id| guard.tokens.get(token_id))
            .cloned())
    }

    async fn list_tokens(&self, window: QueryWindow) -> StorageResult<Vec<DeathRecord>> {
        let guard = self.read()?;
        let values = guard.tokens.values().cloned().collect();
        Ok(apply_window(values, window))
    }

    async fn token_summary(&self) -> StorageResult<TokenSummary> {
        let guard = self.read()?;
        Ok(TokenSummary {
            count: guard.tokens.len() as u64,
            oldest: guard.tokens.keys().next().copied().unwrap_or_default(),
            newest: guard.tokens.keys().next_back().copied().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EventStore for InMemoryLedgerStorage {
    async fn list_events(&self, window: QueryWindow) -> StorageResult<Vec<EventRecord>> {
        let guard = self.read()?;
        Ok(apply_window(guard.events.clone(), window))
    }

    async fn latest_event_hash(&self) -> StorageResult<Option<String>> {
        Ok(self.read()?.events.last().map(|e| e.hash.clone()))
    }
}

#[async_trait]
impl CommitStore for InMemoryLedgerStorage {
    async fn commit(
        &self,
        mutation: LedgerMutation,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<CommitReceipt> {
        let mut guard = self.write()?;
        if guard.metadata.is_none() {
            return Err(StorageError::Uninitialized);
        }

        // Stage everything fallible first; the state is only touched once the
        // event record has been built.
        let mut binding = None;
        let mut minted = None;
        match &mutation {
            LedgerMutation::SetRegistrar { .. } => {}
            LedgerMutation::BindIdentity {
                identifier,
                account,
                bound_by,
            } => {
                if guard.bindings.contains_key(identifier) {
                    return Err(StorageError::Conflict(format!(
                        "identifier {identifier} already bound"
                    )));
                }
                if guard.account_index.contains_key(account) {
                    return Err(StorageError::Conflict(format!(
                        "account {account} already bound"
                    )));
                }
                binding = Some(IdentityBinding {
                    identifier: identifier.clone(),
                    account: account.clone(),
                    bound_by: bound_by.clone(),
                    bound_at: timestamp,
                });
            }
            LedgerMutation::MintToken {
                identifier,
                content_reference,
                recorded_by,
            } => {
                let owner = guard
                    .bindings
                    .get(identifier)
                    .map(|b| b.account.clone())
                    .ok_or_else(|| {
                        StorageError::InvariantViolation(format!(
                            "identifier {identifier} is not bound"
                        ))
                    })?;
                if let Some(existing) = guard.token_index.get(identifier) {
                    return Err(StorageError::Conflict(format!(
                        "identifier {identifier} already holds token {existing}"
                    )));
                }
                minted = Some(DeathRecord {
                    token_id: guard.last_token_id.next(),
                    identifier: identifier.clone(),
                    owner,
                    content_reference: content_reference.clone(),
                    recorded_by: recorded_by.clone(),
                    created_at: timestamp,
                });
            }
        }

        let event = mutation.event(minted.as_ref())?;
        let previous_hash = guard.events.last().map(|e| e.hash.clone());
        let sequence = guard.events.len() as u64 + 1;
        let hash = compute_event_hash(&event, timestamp, previous_hash.as_deref(), sequence)?;
        let record = EventRecord {
            event_id: format!("event-{}", Uuid::new_v4()),
            sequence,
            timestamp,
            event,
            previous_hash,
            hash,
        };

        if let LedgerMutation::SetRegistrar {
            account,
            authorized,
        } = &mutation
        {
            guard.registrars.insert(account.clone(), *authorized);
        }
        if let Some(binding) = &binding {
            guard
                .account_index
                .insert(binding.account.clone(), binding.identifier.clone());
            guard
                .bindings
                .insert(binding.identifier.clone(), binding.clone());
        }
        if let Some(token) = &minted {
            guard.last_token_id = token.token_id;
            guard
                .token_index
                .insert(token.identifier.clone(), token.token_id);
            guard.tokens.insert(token.token_id, token.clone());
        }
        guard.events.push(record.clone());

        Ok(CommitReceipt {
            event: record,
            binding,
            minted,
        })
    }
}

pub(crate) fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::verify_event_chain;
    use eternal_ledger_types::{ContentReference, LedgerEvent};

    async fn initialized() -> InMemoryLedgerStorage {
        let storage = InMemoryLedgerStorage::new();
        storage
            .initialize(AccountId::new("0xowner"), Utc::now())
            .await
            .unwrap();
        storage
    }

    fn bind(identifier: &str, account: &str) -> LedgerMutation {
        LedgerMutation::BindIdentity {
            identifier: Identifier::new(identifier),
            account: AccountId::new(account),
            bound_by: AccountId::new("0xregistrar"),
        }
    }

    fn mint(identifier: &str, cid: &str) -> LedgerMutation {
        LedgerMutation::MintToken {
            identifier: Identifier::new(identifier),
            content_reference: ContentReference::new(cid),
            recorded_by: AccountId::new("0xregistrar"),
        }
    }

    #[tokio::test]
    async fn commit_requires_initialization() {
        let storage = InMemoryLedgerStorage::new();
        let result = storage.commit(bind("S1234567A", "0xalice"), Utc::now()).await;
        assert!(matches!(result, Err(StorageError::Uninitialized)));
    }

    #[tokio::test]
    async fn initialize_keeps_the_first_owner() {
        let storage = initialized().await;
        let again = storage
            .initialize(AccountId::new("0xsomeone-else"), Utc::now())
            .await
            .unwrap();
        assert_eq!(again.owner, AccountId::new("0xowner"));
    }

    #[tokio::test]
    async fn duplicate_bindings_conflict_on_either_side() {
        let storage = initialized().await;
        storage
            .commit(bind("S1234567A", "0xalice"), Utc::now())
            .await
            .unwrap();

        let same_identifier = storage.commit(bind("S1234567A", "0xbob"), Utc::now()).await;
        assert!(matches!(same_identifier, Err(StorageError::Conflict(_))));

        let same_account = storage.commit(bind("S7654321B", "0xalice"), Utc::now()).await;
        assert!(matches!(same_account, Err(StorageError::Conflict(_))));

        assert!(storage
            .binding_by_account(&AccountId::new("0xbob"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(storage.list_events(QueryWindow::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mint_assigns_sequential_ids_to_bound_accounts() {
        let storage = initialized().await;
        storage
            .commit(bind("S1111111A", "0xalice"), Utc::now())
            .await
            .unwrap();
        storage
            .commit(bind("S2222222B", "0xbob"), Utc::now())
            .await
            .unwrap();

        let first = storage
            .commit(mint("S1111111A", "bafkreiexample111"), Utc::now())
            .await
            .unwrap();
        let second = storage
            .commit(mint("S2222222B", "bafkreiexample222"), Utc::now())
            .await
            .unwrap();

        assert_eq!(first.minted.unwrap().token_id, TokenId(1));
        let second = second.minted.unwrap();
        assert_eq!(second.token_id, TokenId(2));
        assert_eq!(second.owner, AccountId::new("0xbob"));

        let summary = storage.token_summary().await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.oldest, TokenId(1));
        assert_eq!(summary.newest, TokenId(2));
    }

    #[tokio::test]
    async fn mint_rejects_unbound_and_repeated_identifiers() {
        let storage = initialized().await;
        let unbound = storage
            .commit(mint("S9999999Z", "bafkreiexample111"), Utc::now())
            .await;
        assert!(matches!(unbound, Err(StorageError::InvariantViolation(_))));

        storage
            .commit(bind("S1111111A", "0xalice"), Utc::now())
            .await
            .unwrap();
        storage
            .commit(mint("S1111111A", "bafkreiexample111"), Utc::now())
            .await
            .unwrap();
        let repeated = storage
            .commit(mint("S1111111A", "bafkreiexample222"), Utc::now())
            .await;
        assert!(matches!(repeated, Err(StorageError::Conflict(_))));
        assert_eq!(storage.token_summary().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn every_commit_extends_the_hash_chain() {
        let storage = initialized().await;
        storage
            .commit(
                LedgerMutation::SetRegistrar {
                    account: AccountId::new("0xregistrar"),
                    authorized: true,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        storage
            .commit(bind("S1111111A", "0xalice"), Utc::now())
            .await
            .unwrap();
        let receipt = storage
            .commit(mint("S1111111A", "bafkreiexample111"), Utc::now())
            .await
            .unwrap();

        let events = storage.list_events(QueryWindow::all()).await.unwrap();
        assert_eq!(events.len(), 3);
        verify_event_chain(&events).unwrap();
        assert_eq!(
            storage.latest_event_hash().await.unwrap(),
            Some(receipt.event.hash)
        );
        assert!(matches!(
            events[2].event,
            LedgerEvent::DeathRecorded { token_id: TokenId(1), .. }
        ));
    }
}
