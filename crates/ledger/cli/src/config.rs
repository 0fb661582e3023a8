//! Configuration for the eternal-ledger CLI

use std::sync::Arc;

use eternal_ledger::RegistryConfig;
use eternal_ledger_storage::memory::InMemoryLedgerStorage;
use eternal_ledger_storage::LedgerStorage;
use serde::{Deserialize, Serialize};

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Registry tuning
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local storage, discarded on exit
    #[default]
    Memory,

    /// SQLite database (requires the `sqlite` feature)
    Sqlite {
        /// Connection URL, e.g. `sqlite://ledger.db`
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LedgerConfig {
    /// Layer defaults, then the optional file, then `ETERNAL_LEDGER__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&LedgerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Double underscore keeps field names like `event_capacity` intact
        builder = builder.add_source(
            config::Environment::with_prefix("ETERNAL_LEDGER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

impl StorageConfig {
    pub async fn open(&self) -> anyhow::Result<Arc<dyn LedgerStorage>> {
        match self {
            StorageConfig::Memory => Ok(Arc::new(InMemoryLedgerStorage::new())),
            #[cfg(feature = "sqlite")]
            StorageConfig::Sqlite {
                url,
                max_connections,
            } => {
                let storage = eternal_ledger_storage::sqlite::SqliteLedgerStorage::connect_with_options(
                    url,
                    *max_connections,
                )
                .await?;
                Ok(Arc::new(storage))
            }
            #[cfg(not(feature = "sqlite"))]
            StorageConfig::Sqlite { url, .. } => Err(anyhow::anyhow!(
                "storage {url} needs a build with the `sqlite` feature"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eternal_ledger_storage::MetadataStore;
    use std::sync::Mutex;

    // Serializes tests that read or write ETERNAL_LEDGER__* variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        for (key, _) in vars {
            std::env::remove_var(key);
        }
        result.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.registry.event_capacity, 1024);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = with_env(&[], || LedgerConfig::load(None).unwrap());
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.registry.event_capacity, 1024);
    }

    #[test]
    fn test_env_overrides_registry_capacity() {
        let config = with_env(&[("ETERNAL_LEDGER__REGISTRY__EVENT_CAPACITY", "7")], || {
            LedgerConfig::load(None).unwrap()
        });
        assert_eq!(config.registry.event_capacity, 7);
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_env_selects_sqlite_storage() {
        let config = with_env(
            &[
                ("ETERNAL_LEDGER__STORAGE__TYPE", "sqlite"),
                ("ETERNAL_LEDGER__STORAGE__URL", "sqlite://env.db"),
                ("ETERNAL_LEDGER__LOGGING__JSON", "true"),
            ],
            || LedgerConfig::load(None).unwrap(),
        );
        match config.storage {
            StorageConfig::Sqlite {
                url,
                max_connections,
            } => {
                assert_eq!(url, "sqlite://env.db");
                assert_eq!(max_connections, 4);
            }
            other => panic!("unexpected storage: {other:?}"),
        }
        assert!(config.logging.json);
    }

    #[test]
    fn test_sqlite_storage_from_toml() {
        let config: LedgerConfig = toml::from_str(
            r#"
[storage]
type = "sqlite"
url = "sqlite://ledger.db"

[registry]
event_capacity = 16
"#,
        )
        .unwrap();
        match config.storage {
            StorageConfig::Sqlite {
                url,
                max_connections,
            } => {
                assert_eq!(url, "sqlite://ledger.db");
                assert_eq!(max_connections, 4);
            }
            other => panic!("unexpected storage: {other:?}"),
        }
        assert_eq!(config.registry.event_capacity, 16);
    }

    #[tokio::test]
    async fn test_memory_storage_opens() {
        let storage = StorageConfig::Memory.open().await.unwrap();
        assert!(storage.metadata().await.unwrap().is_none());
    }
}
