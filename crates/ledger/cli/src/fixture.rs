//! TOML seed fixtures: an owner, registrars, bindings and deaths applied in order.

use std::path::Path;

use eternal_ledger::{
    AccountId, ContentReference, EternalLedger, Identifier, RegistryError, TokenId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid fixture: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("fixture step `{step}` failed: {source}")]
    Step {
        step: String,
        source: RegistryError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub owner: String,

    #[serde(default)]
    pub registrars: Vec<String>,

    #[serde(default)]
    pub bindings: Vec<BindingStep>,

    #[serde(default)]
    pub deaths: Vec<DeathStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingStep {
    pub registrar: String,
    pub identifier: String,
    pub account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathStep {
    pub registrar: String,
    pub identifier: String,
    pub content_reference: String,
}

/// Counts of what a fixture committed. `applied` is false when the store
/// already had history and the fixture was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixtureReport {
    pub applied: bool,
    pub registrars: usize,
    pub bindings: usize,
    pub deaths: usize,
    pub minted: Vec<TokenId>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, FixtureError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn owner(&self) -> AccountId {
        AccountId::new(self.owner.as_str())
    }

    /// Apply the fixture only to a store with no history, so repeated runs
    /// against a persistent store inspect it instead of replaying.
    pub async fn seed(&self, ledger: &EternalLedger) -> Result<FixtureReport, FixtureError> {
        let head = ledger
            .head_hash()
            .await
            .map_err(|source| FixtureError::Step {
                step: "inspect store".to_string(),
                source,
            })?;
        if let Some(head) = head {
            info!(head = %head, "Store already has history; fixture skipped");
            return Ok(FixtureReport::default());
        }
        self.apply(ledger).await
    }

    /// Apply every step in file order, stopping at the first failure.
    pub async fn apply(&self, ledger: &EternalLedger) -> Result<FixtureReport, FixtureError> {
        let owner = self.owner();
        let mut report = FixtureReport {
            applied: true,
            ..FixtureReport::default()
        };

        for registrar in &self.registrars {
            ledger
                .authorize_registrar(&owner, &AccountId::new(registrar.as_str()))
                .await
                .map_err(|source| FixtureError::Step {
                    step: format!("authorize {registrar}"),
                    source,
                })?;
            report.registrars += 1;
        }

        for step in &self.bindings {
            ledger
                .bind_identity(
                    &AccountId::new(step.registrar.as_str()),
                    &Identifier::new(step.identifier.as_str()),
                    &AccountId::new(step.account.as_str()),
                )
                .await
                .map_err(|source| FixtureError::Step {
                    step: format!("bind {}", step.identifier),
                    source,
                })?;
            report.bindings += 1;
        }

        for step in &self.deaths {
            let record = ledger
                .record_death(
                    &AccountId::new(step.registrar.as_str()),
                    &Identifier::new(step.identifier.as_str()),
                    &ContentReference::new(step.content_reference.as_str()),
                )
                .await
                .map_err(|source| FixtureError::Step {
                    step: format!("death {}", step.identifier),
                    source,
                })?;
            debug!(identifier = %step.identifier, token_id = %record.token_id, "Fixture death applied");
            report.deaths += 1;
            report.minted.push(record.token_id);
        }

        Ok(report)
    }
}
