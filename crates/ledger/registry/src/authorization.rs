//! Owner-gated registrar set.

use eternal_ledger_storage::{LedgerMutation, QueryWindow};
use eternal_ledger_types::{AccountId, EventRecord, RegistrarEntry};
use tracing::info;

use crate::error::RegistryResult;
use crate::ledger::{account_key, normalize_account, EternalLedger};

impl EternalLedger {
    /// Authorize `account` to bind identities and record deaths.
    ///
    /// Owner only. Idempotent: re-authorizing succeeds and emits again.
    pub async fn authorize_registrar(
        &self,
        caller: &AccountId,
        account: &AccountId,
    ) -> RegistryResult<EventRecord> {
        self.set_registrar(caller, account, true).await
    }

    /// Withdraw registrar privileges. Owner only, idempotent.
    pub async fn revoke_registrar(
        &self,
        caller: &AccountId,
        account: &AccountId,
    ) -> RegistryResult<EventRecord> {
        self.set_registrar(caller, account, false).await
    }

    async fn set_registrar(
        &self,
        caller: &AccountId,
        account: &AccountId,
        authorized: bool,
    ) -> RegistryResult<EventRecord> {
        self.ensure_owner(caller)?;
        let account = normalize_account(account)?;

        let _gate = self.commit_gate.lock().await;
        let receipt = self
            .commit(LedgerMutation::SetRegistrar {
                account: account.clone(),
                authorized,
            })
            .await?;

        if authorized {
            info!(account = %account, "Registrar authorized");
        } else {
            info!(account = %account, "Registrar revoked");
        }
        Ok(receipt.event)
    }

    pub async fn is_registrar(&self, account: &AccountId) -> RegistryResult<bool> {
        match account_key(account) {
            Some(account) => Ok(self.storage.is_registrar(&account).await?),
            None => Ok(false),
        }
    }

    /// Every account the owner has ever authorized or revoked.
    pub async fn registrars(&self) -> RegistryResult<Vec<RegistrarEntry>> {
        Ok(self.storage.list_registrars(QueryWindow::all()).await?)
    }
}
