//! Read-only queries. None of these take the commit gate; each reads a
//! single storage snapshot.

use eternal_ledger_storage::{verify_event_chain, QueryWindow};
use eternal_ledger_types::{AccountId, DeathRecord, DeathStatistics, EventRecord, Identifier, TokenId};

use crate::error::{RegistryError, RegistryResult};
use crate::ledger::{account_key, identifier_key, EternalLedger};

impl EternalLedger {
    pub async fn is_deceased(&self, identifier: &Identifier) -> RegistryResult<bool> {
        Ok(!self.get_token_by_identifier(identifier).await?.is_none())
    }

    /// Token minted for `identifier`, or [`TokenId::NONE`] when the identifier
    /// is unbound or still alive.
    pub async fn get_token_by_identifier(&self, identifier: &Identifier) -> RegistryResult<TokenId> {
        let Some(identifier) = identifier_key(identifier) else {
            return Ok(TokenId::NONE);
        };
        Ok(self
            .storage
            .token_by_identifier(&identifier)
            .await?
            .map(|record| record.token_id)
            .unwrap_or(TokenId::NONE))
    }

    /// All minted tokens in ascending id order, as parallel sequences:
    /// `records[k]` belongs to `ids[k]`.
    pub async fn get_all_deceased(&self) -> RegistryResult<(Vec<TokenId>, Vec<DeathRecord>)> {
        let records = self.storage.list_tokens(QueryWindow::all()).await?;
        let ids = records.iter().map(|record| record.token_id).collect();
        Ok((ids, records))
    }

    pub async fn get_death_statistics(&self) -> RegistryResult<DeathStatistics> {
        let summary = self.storage.token_summary().await?;
        if summary.count == 0 {
            return Ok(DeathStatistics::empty(self.metadata.created_at));
        }
        Ok(DeathStatistics {
            total: summary.count,
            oldest_token_id: summary.oldest,
            newest_token_id: summary.newest,
            registry_created_at: self.metadata.created_at,
        })
    }

    pub async fn total_supply(&self) -> RegistryResult<u64> {
        Ok(self.storage.token_summary().await?.count)
    }

    pub async fn owner_of(&self, token_id: TokenId) -> RegistryResult<AccountId> {
        self.storage
            .token(token_id)
            .await?
            .map(|record| record.owner)
            .ok_or(RegistryError::TokenNotFound(token_id))
    }

    /// 1 if `account` holds a lifecycle token, else 0.
    pub async fn balance_of(&self, account: &AccountId) -> RegistryResult<u64> {
        let Some(account) = account_key(account) else {
            return Ok(0);
        };
        Ok(u64::from(self.storage.token_by_owner(&account).await?.is_some()))
    }

    pub async fn token(&self, token_id: TokenId) -> RegistryResult<Option<DeathRecord>> {
        Ok(self.storage.token(token_id).await?)
    }

    /// Records whose token id equals `filter` or whose content reference
    /// contains it. A blank filter returns everything. Ascending id order.
    pub async fn search_records(&self, filter: &str) -> RegistryResult<Vec<DeathRecord>> {
        let records = self.storage.list_tokens(QueryWindow::all()).await?;
        let filter = filter.trim();
        if filter.is_empty() {
            return Ok(records);
        }
        let wanted_id = filter.parse::<u64>().ok().map(TokenId);
        Ok(records
            .into_iter()
            .filter(|record| {
                Some(record.token_id) == wanted_id
                    || record.content_reference.as_str().contains(filter)
            })
            .collect())
    }

    /// Persisted notification log, oldest first.
    pub async fn events(&self, window: QueryWindow) -> RegistryResult<Vec<EventRecord>> {
        Ok(self.storage.list_events(window).await?)
    }

    /// Hash of the newest committed event, `None` for a registry with no history.
    pub async fn head_hash(&self) -> RegistryResult<Option<String>> {
        Ok(self.storage.latest_event_hash().await?)
    }

    /// Verify the whole event log's hash chain; returns the number of events.
    pub async fn verify_event_log(&self) -> RegistryResult<usize> {
        let events = self.storage.list_events(QueryWindow::all()).await?;
        verify_event_chain(&events)?;
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RegistryError;
    use crate::{AccountId, ContentReference, EternalLedger, Identifier, QueryWindow, TokenId};

    async fn populated() -> (EternalLedger, AccountId) {
        let owner = AccountId::new("0xowner");
        let registrar = AccountId::new("0xhospital");
        let ledger = EternalLedger::new(owner.clone()).await.unwrap();
        ledger.authorize_registrar(&owner, &registrar).await.unwrap();
        for (nric, wallet) in [
            ("S1111111A", "0xalice"),
            ("S2222222B", "0xbob"),
            ("S3333333C", "0xcarol"),
        ] {
            ledger
                .bind_identity(&registrar, &Identifier::new(nric), &AccountId::new(wallet))
                .await
                .unwrap();
        }
        for (nric, cid) in [("S1111111A", "bafkreiexample111"), ("S2222222B", "bafkreiexample222")] {
            ledger
                .record_death(&registrar, &Identifier::new(nric), &ContentReference::new(cid))
                .await
                .unwrap();
        }
        (ledger, registrar)
    }

    #[tokio::test]
    async fn empty_registry_views() {
        let ledger = EternalLedger::new(AccountId::new("0xowner")).await.unwrap();
        let stats = ledger.get_death_statistics().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.oldest_token_id, TokenId::NONE);
        assert_eq!(stats.newest_token_id, TokenId::NONE);
        assert_eq!(stats.registry_created_at, ledger.created_at());

        let (ids, records) = ledger.get_all_deceased().await.unwrap();
        assert!(ids.is_empty() && records.is_empty());
        assert_eq!(ledger.head_hash().await.unwrap(), None);
        assert!(ledger.search_records("").await.unwrap().is_empty());
        assert_eq!(ledger.verify_event_log().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deceased_lookups() {
        let (ledger, _) = populated().await;
        assert!(ledger.is_deceased(&Identifier::new("S1111111A")).await.unwrap());
        assert!(!ledger.is_deceased(&Identifier::new("S3333333C")).await.unwrap());
        assert!(!ledger.is_deceased(&Identifier::new("S9999999Z")).await.unwrap());
        assert!(!ledger.is_deceased(&Identifier::new("")).await.unwrap());

        assert_eq!(
            ledger
                .get_token_by_identifier(&Identifier::new("S2222222B"))
                .await
                .unwrap(),
            TokenId(2)
        );
        assert_eq!(
            ledger
                .get_token_by_identifier(&Identifier::new("S3333333C"))
                .await
                .unwrap(),
            TokenId::NONE
        );
    }

    #[tokio::test]
    async fn all_deceased_are_parallel_and_ascending() {
        let (ledger, _) = populated().await;
        let (ids, records) = ledger.get_all_deceased().await.unwrap();
        assert_eq!(ids, vec![TokenId(1), TokenId(2)]);
        for (id, record) in ids.iter().zip(&records) {
            assert_eq!(*id, record.token_id);
        }
        assert_eq!(records[1].identifier, Identifier::new("S2222222B"));

        let stats = ledger.get_death_statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.oldest_token_id, TokenId(1));
        assert_eq!(stats.newest_token_id, TokenId(2));
    }

    #[tokio::test]
    async fn token_ownership_views() {
        let (ledger, _) = populated().await;
        assert_eq!(ledger.total_supply().await.unwrap(), 2);
        assert_eq!(
            ledger.owner_of(TokenId(1)).await.unwrap(),
            AccountId::new("0xalice")
        );
        assert!(matches!(
            ledger.owner_of(TokenId(3)).await,
            Err(RegistryError::TokenNotFound(TokenId(3)))
        ));
        assert_eq!(ledger.balance_of(&AccountId::new("0xbob")).await.unwrap(), 1);
        assert_eq!(ledger.balance_of(&AccountId::new("0xcarol")).await.unwrap(), 0);
        assert_eq!(ledger.balance_of(&AccountId::new("0xnobody")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_matches_id_or_reference() {
        let (ledger, _) = populated().await;
        assert_eq!(ledger.search_records("  ").await.unwrap().len(), 2);

        let by_id = ledger.search_records("2").await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].token_id, TokenId(2));

        let by_reference = ledger.search_records("example1").await.unwrap();
        assert_eq!(by_reference.len(), 1);
        assert_eq!(by_reference[0].token_id, TokenId(1));

        let broad = ledger.search_records("bafkrei").await.unwrap();
        assert_eq!(broad.len(), 2);
        assert!(ledger.search_records("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_log_is_ordered_and_verifiable() {
        let (ledger, _) = populated().await;
        // authorize + 3 binds + 2 deaths
        assert_eq!(ledger.verify_event_log().await.unwrap(), 6);

        let page = ledger
            .events(QueryWindow {
                limit: 2,
                offset: 4,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 5);
        assert_eq!(page[1].event.name(), "death_recorded");
        assert_eq!(
            ledger.head_hash().await.unwrap(),
            Some(page[1].hash.clone())
        );
    }
}
