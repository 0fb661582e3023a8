//! One-time identifier <-> account binding.

use eternal_ledger_storage::{LedgerMutation, StorageError};
use eternal_ledger_types::{AccountId, Identifier, IdentityBinding};
use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::ledger::{
    account_key, caller_key, identifier_key, normalize_account, normalize_identifier,
    EternalLedger,
};

impl EternalLedger {
    /// Bind `identifier` to `account`. Registrar only.
    ///
    /// Both sides are unique for the lifetime of the registry: an identifier
    /// never moves to another account and an account never receives a second
    /// identifier. There is no unbind.
    pub async fn bind_identity(
        &self,
        caller: &AccountId,
        identifier: &Identifier,
        account: &AccountId,
    ) -> RegistryResult<IdentityBinding> {
        let _gate = self.commit_gate.lock().await;
        self.ensure_registrar(caller).await?;

        let identifier = normalize_identifier(identifier)?;
        let account = normalize_account(account)?;

        if let Some(existing) = self.storage.binding_by_identifier(&identifier).await? {
            warn!(
                identifier = %identifier,
                bound_to = %existing.account,
                "Rejected rebinding of identifier"
            );
            return Err(RegistryError::IdentifierAlreadyBound(identifier));
        }
        if let Some(existing) = self.storage.binding_by_account(&account).await? {
            warn!(
                account = %account,
                bound_to = %existing.identifier,
                "Rejected second identifier for account"
            );
            return Err(RegistryError::AccountAlreadyBound(account));
        }

        let receipt = self
            .commit(LedgerMutation::BindIdentity {
                identifier: identifier.clone(),
                account: account.clone(),
                bound_by: caller_key(caller),
            })
            .await?;

        info!(identifier = %identifier, account = %account, registrar = %caller, "Identity bound");

        receipt.binding.ok_or_else(|| {
            StorageError::InvariantViolation(format!("bind of {identifier} returned no binding"))
                .into()
        })
    }

    /// Account bound to `identifier`, if any.
    pub async fn account_of(&self, identifier: &Identifier) -> RegistryResult<Option<AccountId>> {
        Ok(self.binding(identifier).await?.map(|b| b.account))
    }

    /// Identifier bound to `account`, if any.
    pub async fn identifier_of(&self, account: &AccountId) -> RegistryResult<Option<Identifier>> {
        let Some(account) = account_key(account) else {
            return Ok(None);
        };
        Ok(self
            .storage
            .binding_by_account(&account)
            .await?
            .map(|b| b.identifier))
    }

    pub async fn binding(&self, identifier: &Identifier) -> RegistryResult<Option<IdentityBinding>> {
        let Some(identifier) = identifier_key(identifier) else {
            return Ok(None);
        };
        Ok(self.storage.binding_by_identifier(&identifier).await?)
    }
}
