//! Death recording and the soulbound lifecycle token.

use eternal_ledger_storage::{LedgerMutation, StorageError};
use eternal_ledger_types::{AccountId, ContentReference, DeathRecord, Identifier, TokenId};
use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::ledger::{caller_key, normalize_content_reference, normalize_identifier, EternalLedger};

impl EternalLedger {
    /// Record the death of a bound identifier and mint its lifecycle token.
    ///
    /// Registrar only. At most one token per identifier; the token is owned
    /// by the bound account and ids increase in commit order starting at 1.
    pub async fn record_death(
        &self,
        caller: &AccountId,
        identifier: &Identifier,
        content_reference: &ContentReference,
    ) -> RegistryResult<DeathRecord> {
        let _gate = self.commit_gate.lock().await;
        self.ensure_registrar(caller).await?;

        let identifier = normalize_identifier(identifier)?;
        let content_reference = normalize_content_reference(content_reference)?;

        if self.storage.binding_by_identifier(&identifier).await?.is_none() {
            warn!(identifier = %identifier, "Rejected death record for unbound identifier");
            return Err(RegistryError::IdentifierNotRegistered(identifier));
        }
        if let Some(existing) = self.storage.token_by_identifier(&identifier).await? {
            warn!(
                identifier = %identifier,
                token_id = %existing.token_id,
                "Rejected duplicate death record"
            );
            return Err(RegistryError::AlreadyDeceased(identifier));
        }

        let receipt = self
            .commit(LedgerMutation::MintToken {
                identifier: identifier.clone(),
                content_reference,
                recorded_by: caller_key(caller),
            })
            .await?;

        let minted = receipt.minted.ok_or_else(|| {
            StorageError::InvariantViolation(format!("death of {identifier} minted no token"))
        })?;
        info!(
            identifier = %identifier,
            token_id = %minted.token_id,
            owner = %minted.owner,
            registrar = %caller,
            "Death recorded"
        );
        Ok(minted)
    }

    /// Always fails: lifecycle tokens never change hands.
    pub fn transfer_from(
        &self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        token_id: TokenId,
    ) -> RegistryResult<()> {
        warn!(caller = %caller, from = %from, to = %to, token_id = %token_id, "Rejected transfer");
        Err(RegistryError::NonTransferable)
    }

    /// Always fails.
    pub fn approve(
        &self,
        caller: &AccountId,
        spender: &AccountId,
        token_id: TokenId,
    ) -> RegistryResult<()> {
        warn!(caller = %caller, spender = %spender, token_id = %token_id, "Rejected approval");
        Err(RegistryError::NonTransferable)
    }

    /// Always fails.
    pub fn set_approval_for_all(
        &self,
        caller: &AccountId,
        operator: &AccountId,
        approved: bool,
    ) -> RegistryResult<()> {
        warn!(
            caller = %caller,
            operator = %operator,
            approved,
            "Rejected operator approval"
        );
        Err(RegistryError::NonTransferable)
    }

    /// Every minted token is permanently locked.
    pub async fn locked(&self, token_id: TokenId) -> RegistryResult<bool> {
        match self.storage.token(token_id).await? {
            Some(_) => Ok(true),
            None => Err(RegistryError::TokenNotFound(token_id)),
        }
    }
}
