use eternal_ledger_storage::StorageError;
use eternal_ledger_types::{AccountId, Identifier, TokenId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Privilege a mutating operation requires of its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Registrar,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Registrar => write!(f, "registrar"),
        }
    }
}

/// Registry errors. Every variant is returned before anything is committed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("account {caller} is not authorized: {required} privilege required")]
    Unauthorized { caller: AccountId, required: Role },

    #[error("identifier {0} already bound")]
    IdentifierAlreadyBound(Identifier),

    #[error("account {0} already bound")]
    AccountAlreadyBound(AccountId),

    #[error("identifier {0} not registered")]
    IdentifierNotRegistered(Identifier),

    #[error("identifier {0} already deceased")]
    AlreadyDeceased(Identifier),

    #[error("soulbound: lifecycle tokens are non-transferable")]
    NonTransferable,

    #[error("token {0} does not exist")]
    TokenNotFound(TokenId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
