//! The application object shared by the HTTP server and the CLI.
//!
//! [`App`] owns every long-lived collaborator: configuration, the store,
//! the index cache, and the two model clients. It is built once at startup
//! with [`App::from_config`], or with [`App::new`] when the caller supplies
//! its own store and model implementations (tests, embedding in another
//! binary).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::IndexCache;
use crate::completion::{create_completer, Completer};
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::files;
use crate::store::{SqliteStore, Store};
use crate::{db, migrate};

pub struct App {
    config: Config,
    store: Arc<dyn Store>,
    cache: IndexCache,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
}

impl App {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            config,
            store,
            cache: IndexCache::new(),
            embedder,
            completer,
        }
    }

    /// Open the database, run migrations, create the storage directories,
    /// and construct the configured model clients.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::run_migrations(&pool).await?;
        files::ensure_dirs(&config.storage).await?;

        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;
        info!(
            db = %config.db.path.display(),
            embedding = %config.embedding.provider,
            completion = %config.completion.provider,
            "application initialized"
        );

        Ok(Self::new(
            config,
            Arc::new(SqliteStore::new(pool)),
            embedder,
            completer,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn completer(&self) -> &dyn Completer {
        self.completer.as_ref()
    }

    /// Check each dependency. Never fails; problems show up as a `degraded` status.
    pub async fn health(&self) -> Health {
        let database = match self.store.ping().await {
            Ok(()) => ComponentStatus::ok(),
            Err(e) => {
                warn!(error = %e, "database health check failed");
                ComponentStatus::error(e.to_string())
            }
        };
        let storage = if files::dirs_ready(&self.config.storage) {
            ComponentStatus::ok()
        } else {
            ComponentStatus::error("upload or text directory missing")
        };

        let healthy = database.ok && storage.ok;
        Health {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            components: Components {
                database,
                storage,
                embedding: ProviderStatus {
                    provider: self.config.embedding.provider.clone(),
                    model: self.embedder.model_name().to_string(),
                },
                completion: ProviderStatus {
                    provider: self.config.completion.provider.clone(),
                    model: self.completer.model_name().to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub components: Components,
}

#[derive(Debug, Serialize)]
pub struct Components {
    pub database: ComponentStatus,
    pub storage: ComponentStatus,
    pub embedding: ProviderStatus,
    pub completion: ProviderStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn from_config_prepares_storage_and_reports_healthy() {
        let tmp = TempDir::new().unwrap();
        let app = App::from_config(Config::with_root(tmp.path()))
            .await
            .unwrap();
        assert!(tmp.path().join("uploads").is_dir());
        assert!(tmp.path().join("texts").is_dir());

        let health = app.health().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.components.completion.provider, "disabled");
        assert!(!app.completer().is_enabled());
    }

    #[tokio::test]
    async fn missing_directory_degrades_health() {
        let tmp = TempDir::new().unwrap();
        let app = App::from_config(Config::with_root(tmp.path()))
            .await
            .unwrap();
        std::fs::remove_dir_all(tmp.path().join("texts")).unwrap();

        let health = app.health().await;
        assert_eq!(health.status, "degraded");
        assert!(!health.components.storage.ok);
        assert!(health.components.database.ok);
    }
}
