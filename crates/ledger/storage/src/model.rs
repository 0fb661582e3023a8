use crate::{StorageError, StorageResult};
use eternal_ledger_types::{
    AccountId, ContentReference, DeathRecord, EventRecord, Identifier, IdentityBinding,
    LedgerEvent, TokenId,
};
use serde::{Deserialize, Serialize};

/// A validated state change. Storage assigns token ids, sequences and hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerMutation {
    SetRegistrar {
        account: AccountId,
        authorized: bool,
    },
    BindIdentity {
        identifier: Identifier,
        account: AccountId,
        bound_by: AccountId,
    },
    MintToken {
        identifier: Identifier,
        content_reference: ContentReference,
        recorded_by: AccountId,
    },
}

impl LedgerMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerMutation::SetRegistrar { .. } => "set_registrar",
            LedgerMutation::BindIdentity { .. } => "bind_identity",
            LedgerMutation::MintToken { .. } => "mint_token",
        }
    }

    /// The notification this mutation emits once applied.
    pub(crate) fn event(&self, minted: Option<&DeathRecord>) -> StorageResult<LedgerEvent> {
        match self {
            LedgerMutation::SetRegistrar {
                account,
                authorized: true,
            } => Ok(LedgerEvent::RegistrarAuthorized {
                account: account.clone(),
            }),
            LedgerMutation::SetRegistrar {
                account,
                authorized: false,
            } => Ok(LedgerEvent::RegistrarRevoked {
                account: account.clone(),
            }),
            LedgerMutation::BindIdentity {
                identifier,
                account,
                ..
            } => Ok(LedgerEvent::IdentityBound {
                identifier: identifier.clone(),
                account: account.clone(),
            }),
            LedgerMutation::MintToken {
                identifier,
                content_reference,
                ..
            } => {
                let record = minted.ok_or_else(|| {
                    StorageError::InvariantViolation(format!(
                        "mint for {identifier} produced no token"
                    ))
                })?;
                Ok(LedgerEvent::DeathRecorded {
                    identifier: identifier.clone(),
                    token_id: record.token_id,
                    content_reference: content_reference.clone(),
                })
            }
        }
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub event: EventRecord,
    pub binding: Option<IdentityBinding>,
    pub minted: Option<DeathRecord>,
}

/// Token count and id bounds read in a single snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub count: u64,
    pub oldest: TokenId,
    pub newest: TokenId,
}
