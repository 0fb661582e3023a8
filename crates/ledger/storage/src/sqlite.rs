//! SQLite adapter for ledger storage.
//!
//! The embedded backend for registries that must survive a restart. Each
//! commit runs in one transaction; UNIQUE constraints on `identities` and
//! `tokens` back the uniqueness invariants at the database level.

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
    AccountId, ContentReference, DeathRecord, EventRecord, Identifier, IdentityBinding,
    LedgerEvent, RegistrarEntry, RegistryMetadata, TokenId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed storage adapter.
#[derive(Clone)]
pub struct SqliteLedgerStorage {
    pool: SqlitePool,
}

impl SqliteLedgerStorage {
    /// Open (creating if missing) the database at `database_url` and
    /// initialize the schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 4).await
    }

    /// Connect with an explicit pool size.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
    ) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidInput(format!("invalid sqlite url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database. The pool is pinned to one connection that
    /// never expires, since each SQLite memory connection is its own database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS ledger_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS registrars (
                account TEXT PRIMARY KEY,
                authorized INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                identifier TEXT PRIMARY KEY,
                account TEXT NOT NULL UNIQUE,
                bound_by TEXT NOT NULL,
                bound_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                token_id INTEGER PRIMARY KEY,
                identifier TEXT NOT NULL UNIQUE REFERENCES identities (identifier),
                owner TEXT NOT NULL,
                content_reference TEXT NOT NULL,
                recorded_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ledger_events (
                sequence INTEGER PRIMARY KEY,
                event_id TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                payload TEXT NOT NULL,
                previous_hash TEXT,
                hash TEXT NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteLedgerStorage {
    async fn initialize(
        &self,
        owner: AccountId,
        created_at: DateTime<Utc>,
    ) -> StorageResult<RegistryMetadata> {
        sqlx::query(
            "INSERT INTO ledger_meta (id, owner, created_at) VALUES (1, ?1, ?2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(owner.0)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.metadata().await?.ok_or(StorageError::Uninitialized)
    }

    async fn metadata(&self) -> StorageResult<Option<RegistryMetadata>> {
        let row = sqlx::query("SELECT owner, created_at FROM ledger_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| {
            Ok(RegistryMetadata {
                owner: AccountId(row.try_get("owner").map_err(backend)?),
                created_at: row.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl RegistrarStore for SqliteLedgerStorage {
    async fn is_registrar(&self, account: &AccountId) -> StorageResult<bool> {
        let row = sqlx::query("SELECT authorized FROM registrars WHERE account = ?1")
            .bind(account.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => row.try_get::<bool, _>("authorized").map_err(backend),
            None => Ok(false),
        }
    }

    async fn list_registrars(&self, window: QueryWindow) -> StorageResult<Vec<RegistrarEntry>> {
        let (limit, offset) = window_bounds(window)?;
        let rows = sqlx::query(
            "SELECT account, authorized FROM registrars ORDER BY account LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|row| {
                Ok(RegistrarEntry {
                    account: AccountId(row.try_get("account").map_err(backend)?),
                    authorized: row.try_get("authorized").map_err(backend)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl IdentityStore for SqliteLedgerStorage {
    async fn binding_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<IdentityBinding>> {
        let row = sqlx::query(
            "SELECT identifier, account, bound_by, bound_at FROM identities WHERE identifier = ?1",
        )
        .bind(identifier.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(binding_from_row).transpose()
    }

    async fn binding_by_account(
        &self,
        account: &AccountId,
    ) -> StorageResult<Option<IdentityBinding>> {
        let row = sqlx::query(
            "SELECT identifier, account, bound_by, bound_at FROM identities WHERE account = ?1",
        )
        .bind(account.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(binding_from_row).transpose()
    }
}

const TOKEN_COLUMNS: &str =
    "token_id, identifier, owner, content_reference, recorded_by, created_at";

#[async_trait]
impl TokenStore for SqliteLedgerStorage {
    async fn token(&self, token_id: TokenId) -> StorageResult<Option<DeathRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_id = ?1"
        ))
        .bind(to_i64(token_id.0)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(token_from_row).transpose()
    }

    async fn token_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> StorageResult<Option<DeathRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE identifier = ?1"
        ))
        .bind(identifier.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(token_from_row).transpose()
    }

    async fn token_by_owner(&self, owner: &AccountId) -> StorageResult<Option<DeathRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE owner = ?1"
        ))
        .bind(owner.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(token_from_row).transpose()
    }

    async fn list_tokens(&self, window: QueryWindow) -> StorageResult<Vec<DeathRecord>> {
        let (limit, offset) = window_bounds(window)?;
        let rows = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens ORDER BY token_id ASC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(token_from_row).collect()
    }

    async fn token_summary(&self) -> StorageResult<TokenSummary> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count,
                   COALESCE(MIN(token_id), 0) AS oldest,
                   COALESCE(MAX(token_id), 0) AS newest
              FROM tokens
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(TokenSummary {
            count: from_i64(row.try_get("count").map_err(backend)?)?,
            oldest: TokenId(from_i64(row.try_get("oldest").map_err(backend)?)?),
            newest: TokenId(from_i64(row.try_get("newest").map_err(backend)?)?),
        })
    }
}

#[async_trait]
impl EventStore for SqliteLedgerStorage {
    async fn list_events(&self, window: QueryWindow) -> StorageResult<Vec<EventRecord>> {
        let (limit, offset) = window_bounds(window)?;
        let rows = sqlx::query(
            r#"
            SELECT sequence, event_id, timestamp, payload, previous_hash, hash
              FROM ledger_events
             ORDER BY sequence ASC
             LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(event_from_row).collect()
    }

    async fn latest_event_hash(&self) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT hash FROM ledger_events ORDER BY sequence DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| row.try_get("hash").map_err(backend))
            .transpose()
    }
}

#[async_trait]
impl CommitStore for SqliteLedgerStorage {
    async fn commit(
        &self,
        mutation: LedgerMutation,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<CommitReceipt> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let initialized = sqlx::query("SELECT 1 FROM ledger_meta WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
        if initialized.is_none() {
            return Err(StorageError::Uninitialized);
        }

        let mut binding = None;
        let mut minted = None;
        match &mutation {
            LedgerMutation::SetRegistrar {
                account,
                authorized,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO registrars (account, authorized) VALUES (?1, ?2)
                    ON CONFLICT (account) DO UPDATE SET authorized = excluded.authorized
                    "#,
                )
                .bind(account.0.clone())
                .bind(*authorized)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
            LedgerMutation::BindIdentity {
                identifier,
                account,
                bound_by,
            } => {
                sqlx::query(
                    "INSERT INTO identities (identifier, account, bound_by, bound_at) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(identifier.0.clone())
                .bind(account.0.clone())
                .bind(bound_by.0.clone())
                .bind(timestamp)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_conflict)?;
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
                let record =
                    mint_token(&mut tx, identifier, content_reference, recorded_by, timestamp)
                        .await?;
                minted = Some(record);
            }
        }

        let event = mutation.event(minted.as_ref())?;
        let record = append_event(&mut tx, event, timestamp).await?;

        tx.commit().await.map_err(backend)?;

        Ok(CommitReceipt {
            event: record,
            binding,
            minted,
        })
    }
}

async fn mint_token(
    conn: &mut SqliteConnection,
    identifier: &Identifier,
    content_reference: &ContentReference,
    recorded_by: &AccountId,
    timestamp: DateTime<Utc>,
) -> StorageResult<DeathRecord> {
    let owner: Option<String> =
        sqlx::query_scalar("SELECT account FROM identities WHERE identifier = ?1")
            .bind(identifier.0.clone())
            .fetch_optional(&mut *conn)
            .await
            .map_err(backend)?;
    let owner = owner.ok_or_else(|| {
        StorageError::InvariantViolation(format!("identifier {identifier} is not bound"))
    })?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT token_id FROM tokens WHERE identifier = ?1")
            .bind(identifier.0.clone())
            .fetch_optional(&mut *conn)
            .await
            .map_err(backend)?;
    if let Some(existing) = existing {
        return Err(StorageError::Conflict(format!(
            "identifier {identifier} already holds token {existing}"
        )));
    }

    // Tokens are never deleted, so MAX + 1 never hands out a used id.
    let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(token_id), 0) FROM tokens")
        .fetch_one(&mut *conn)
        .await
        .map_err(backend)?;
    let token_id = TokenId(from_i64(last)?).next();

    sqlx::query(
        r#"
        INSERT INTO tokens (token_id, identifier, owner, content_reference, recorded_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(to_i64(token_id.0)?)
    .bind(identifier.0.clone())
    .bind(owner.clone())
    .bind(content_reference.0.clone())
    .bind(recorded_by.0.clone())
    .bind(timestamp)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_conflict)?;

    Ok(DeathRecord {
        token_id,
        identifier: identifier.clone(),
        owner: AccountId(owner),
        content_reference: content_reference.clone(),
        recorded_by: recorded_by.clone(),
        created_at: timestamp,
    })
}

async fn append_event(
    conn: &mut SqliteConnection,
    event: LedgerEvent,
    timestamp: DateTime<Utc>,
) -> StorageResult<EventRecord> {
    let last = sqlx::query("SELECT sequence, hash FROM ledger_events ORDER BY sequence DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;

    let (sequence, previous_hash) = match last {
        Some(row) => {
            let seq: i64 = row.try_get("sequence").map_err(backend)?;
            let prev: String = row.try_get("hash").map_err(backend)?;
            (from_i64(seq)? + 1, Some(prev))
        }
        None => (1, None),
    };

    let hash = compute_event_hash(&event, timestamp, previous_hash.as_deref(), sequence)?;
    let event_id = format!("event-{}", Uuid::new_v4());
    let payload =
        serde_json::to_string(&event).map_err(|e| StorageError::Serialization(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO ledger_events (sequence, event_id, timestamp, payload, previous_hash, hash)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(to_i64(sequence)?)
    .bind(event_id.clone())
    .bind(timestamp)
    .bind(payload)
    .bind(previous_hash.clone())
    .bind(hash.clone())
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    Ok(EventRecord {
        event_id,
        sequence,
        timestamp,
        event,
        previous_hash,
        hash,
    })
}

fn binding_from_row(row: SqliteRow) -> StorageResult<IdentityBinding> {
    Ok(IdentityBinding {
        identifier: Identifier(row.try_get("identifier").map_err(backend)?),
        account: AccountId(row.try_get("account").map_err(backend)?),
        bound_by: AccountId(row.try_get("bound_by").map_err(backend)?),
        bound_at: row.try_get("bound_at").map_err(backend)?,
    })
}

fn token_from_row(row: SqliteRow) -> StorageResult<DeathRecord> {
    Ok(DeathRecord {
        token_id: TokenId(from_i64(row.try_get("token_id").map_err(backend)?)?),
        identifier: Identifier(row.try_get("identifier").map_err(backend)?),
        owner: AccountId(row.try_get("owner").map_err(backend)?),
        content_reference: ContentReference(row.try_get("content_reference").map_err(backend)?),
        recorded_by: AccountId(row.try_get("recorded_by").map_err(backend)?),
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn event_from_row(row: SqliteRow) -> StorageResult<EventRecord> {
    let payload: String = row.try_get("payload").map_err(backend)?;
    let event: LedgerEvent = serde_json::from_str(&payload)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(EventRecord {
        event_id: row.try_get("event_id").map_err(backend)?,
        sequence: from_i64(row.try_get("sequence").map_err(backend)?)?,
        timestamp: row.try_get("timestamp").map_err(backend)?,
        event,
        previous_hash: row.try_get("previous_hash").map_err(backend)?,
        hash: row.try_get("hash").map_err(backend)?,
    })
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    backend(err)
}

/// SQLite needs a LIMIT before OFFSET; -1 means unbounded.
fn window_bounds(window: QueryWindow) -> StorageResult<(i64, i64)> {
    let limit = if window.limit == 0 {
        -1
    } else {
        to_i64(window.limit as u64)?
    };
    Ok((limit, to_i64(window.offset as u64)?))
}

fn to_i64(value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidInput("value too large".to_string()))
}

fn from_i64(value: i64) -> StorageResult<u64> {
    u64::try_from(value)
        .map_err(|_| StorageError::InvariantViolation(format!("negative stored value {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::verify_event_chain;

    async fn initialized() -> SqliteLedgerStorage {
        let storage = SqliteLedgerStorage::in_memory().await.unwrap();
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
    async fn unique_constraints_reject_duplicate_bindings() {
        let storage = initialized().await;
        storage
            .commit(bind("S1234567A", "0xalice"), Utc::now())
            .await
            .unwrap();

        let same_identifier = storage.commit(bind("S1234567A", "0xbob"), Utc::now()).await;
        assert!(matches!(same_identifier, Err(StorageError::Conflict(_))));
        let same_account = storage.commit(bind("S7654321B", "0xalice"), Utc::now()).await;
        assert!(matches!(same_account, Err(StorageError::Conflict(_))));

        // Failed commits roll back their event as well.
        assert_eq!(storage.list_events(QueryWindow::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registrar_flag_toggles() {
        let storage = initialized().await;
        let account = AccountId::new("0xregistrar");
        for authorized in [true, false, true] {
            storage
                .commit(
                    LedgerMutation::SetRegistrar {
                        account: account.clone(),
                        authorized,
                    },
                    Utc::now(),
                )
                .await
                .unwrap();
            assert_eq!(storage.is_registrar(&account).await.unwrap(), authorized);
        }
        let listed = storage.list_registrars(QueryWindow::all()).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn mints_are_sequential_and_chain_verifies() {
        let storage = initialized().await;
        storage
            .commit(bind("S1111111A", "0xalice"), Utc::now())
            .await
            .unwrap();
        storage
            .commit(bind("S2222222B", "0xbob"), Utc::now())
            .await
            .unwrap();
        storage
            .commit(mint("S2222222B", "bafkreiexample222"), Utc::now())
            .await
            .unwrap();
        storage
            .commit(mint("S1111111A", "bafkreiexample111"), Utc::now())
            .await
            .unwrap();

        let tokens = storage.list_tokens(QueryWindow::all()).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token_id, TokenId(1));
        assert_eq!(tokens[0].owner, AccountId::new("0xbob"));
        assert_eq!(tokens[1].token_id, TokenId(2));

        let repeated = storage
            .commit(mint("S1111111A", "bafkreiexample333"), Utc::now())
            .await;
        assert!(matches!(repeated, Err(StorageError::Conflict(_))));

        let summary = storage.token_summary().await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.newest, TokenId(2));

        let events = storage.list_events(QueryWindow::all()).await.unwrap();
        assert_eq!(events.len(), 4);
        verify_event_chain(&events).unwrap();
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = std::env::temp_dir().join(format!("eternal-ledger-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());

        {
            let storage = SqliteLedgerStorage::connect(&url).await.unwrap();
            storage
                .initialize(AccountId::new("0xowner"), Utc::now())
                .await
                .unwrap();
            storage
                .commit(bind("S1111111A", "0xalice"), Utc::now())
                .await
                .unwrap();
            storage
                .commit(mint("S1111111A", "bafkreiexample111"), Utc::now())
                .await
                .unwrap();
            storage.pool.close().await;
        }

        let reopened = SqliteLedgerStorage::connect(&url).await.unwrap();
        let metadata = reopened
            .initialize(AccountId::new("0xintruder"), Utc::now())
            .await
            .unwrap();
        assert_eq!(metadata.owner, AccountId::new("0xowner"));
        let token = reopened
            .token_by_identifier(&Identifier::new("S1111111A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.token_id, TokenId(1));
        assert_eq!(token.owner, AccountId::new("0xalice"));
        reopened.pool.close().await;

        let _ = std::fs::remove_file(&path);
    }
}
