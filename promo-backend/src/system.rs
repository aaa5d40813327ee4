//! Loaded analytics system and the service that keeps it current.
//!
//! An `AnalyticsSystem` is one load cycle: the parsed table, the SQLite
//! analytical copy, the vector index and an agent wired to tools over them.
//! `DataService` swaps in a new system after every rebuild; requests hold an
//! `Arc` snapshot, so an in-flight query finishes against the data it started with.

use crate::agent::{PromotionAgent, build_system_prompt};
use crate::ai::{ChatModel, Embedder, OpenAIClient};
use crate::cache::AnswerCache;
use crate::config::Config;
use crate::data::{AnalyticsDb, PromotionTable, add_quarter_column, load_csv};
use crate::errors::Result;
use crate::execution::ExecutionTracker;
use crate::retry::RetryPolicy;
use crate::sync::{BlobStore, DirectoryBlobStore, SyncOutcome, sync_latest_file};
use crate::tools::ToolRegistry;
use crate::tools::builtin::{MlPredictionTool, SemanticSearchTool, SqlQueryTool};
use crate::vector::{VectorIndex, build_documents};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Long-lived collaborators shared by every load cycle
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub cache: Option<Arc<AnswerCache>>,
    pub tracker: Arc<ExecutionTracker>,
}

impl Services {
    pub fn from_config(config: &Config) -> std::result::Result<Self, String> {
        let client = Arc::new(OpenAIClient::from_config(config)?);
        let cache = config.ml_cache_enabled.then(|| {
            Arc::new(AnswerCache::new(
                config.cache_max_entries,
                Duration::from_secs(config.cache_ttl_secs),
            ))
        });
        Ok(Self {
            model: client.clone(),
            embedder: client,
            cache,
            tracker: Arc::new(ExecutionTracker::new()),
        })
    }
}

pub struct AnalyticsSystem {
    pub table: Arc<PromotionTable>,
    pub db: Arc<AnalyticsDb>,
    pub index: Arc<VectorIndex>,
    pub agent: PromotionAgent,
    pub source_file: PathBuf,
}

impl AnalyticsSystem {
    /// Load `csv_path` and wire the tools and agent over it.
    ///
    /// The analytical table is always recreated. The vector index is rebuilt
    /// when `force_index` is set or no usable persisted index exists.
    pub async fn build(config: &Config, csv_path: &Path, force_index: bool, services: &Services) -> Result<Self> {
        let started = Instant::now();
        log::info!("[LOADER] Loading {}", csv_path.display());

        let path = csv_path.to_path_buf();
        let db_path = config.analytics_db_path.clone();
        let table_name = config.table_name.clone();
        let (table, db) = tokio::task::spawn_blocking(move || -> Result<(PromotionTable, AnalyticsDb)> {
            let mut table = load_csv(&path)?;
            add_quarter_column(&mut table);
            let db = AnalyticsDb::create(&db_path, &table_name, &table)?;
            Ok((table, db))
        })
        .await??;
        log::info!(
            "[LOADER] Loaded {} rows, {} columns into table '{}'",
            table.len(),
            table.columns.len(),
            db.table_name()
        );

        let table = Arc::new(table);
        let db = Arc::new(db);
        let index = Arc::new(prepare_index(config, &table, force_index, services.embedder.as_ref()).await?);

        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(SqlQueryTool::new(
            Arc::clone(&db),
            Arc::clone(&services.model),
            RetryPolicy::new(
                config.sql_max_retries,
                Duration::from_millis(config.sql_retry_delay_ms),
            ),
            config.log_queries,
        )));
        registry.register(Arc::new(SemanticSearchTool::new(
            Arc::clone(&index),
            Arc::clone(&services.embedder),
            Arc::clone(&services.model),
            config.top_k_results,
        )));
        registry.register(Arc::new(MlPredictionTool::new(
            Arc::clone(&table),
            Arc::clone(&services.model),
            services.cache.clone(),
            Duration::from_secs(config.ml_training_timeout_secs),
        )));

        let system_prompt = build_system_prompt(
            db.schema_description(),
            &registry.definitions(),
            &config.few_shot_examples(),
        );
        let agent = PromotionAgent::new(
            Arc::clone(&services.model),
            registry,
            Arc::clone(&services.tracker),
            system_prompt,
            config.agent_max_iterations,
        );

        log::info!("[TIMING] System initialised in {}ms", started.elapsed().as_millis());
        Ok(Self {
            table,
            db,
            index,
            agent,
            source_file: csv_path.to_path_buf(),
        })
    }
}

async fn prepare_index(
    config: &Config,
    table: &PromotionTable,
    force: bool,
    embedder: &dyn Embedder,
) -> Result<VectorIndex> {
    let path = config.vector_index_path.clone();

    if !force {
        let load_path = path.clone();
        match tokio::task::spawn_blocking(move || VectorIndex::load(&load_path)).await? {
            Ok(Some(index)) if index.model() == embedder.model_name() => {
                log::info!("[LOADER] Reusing vector index with {} documents", index.len());
                return Ok(index);
            }
            Ok(Some(index)) => log::info!(
                "[LOADER] Persisted index was built with '{}', rebuilding for '{}'",
                index.model(),
                embedder.model_name()
            ),
            Ok(None) => log::info!("[LOADER] No persisted vector index, building"),
            Err(e) => log::warn!("[LOADER] Could not read persisted index ({}), rebuilding", e),
        }
    } else {
        log::info!("[LOADER] Rebuilding vector index");
    }

    let started = Instant::now();
    let documents = build_documents(table);
    let index = VectorIndex::build(documents, embedder, config.embedding_chunk_size).await?;
    log::info!(
        "[TIMING] Embedded {} documents in {}ms",
        index.len(),
        started.elapsed().as_millis()
    );

    let index = tokio::task::spawn_blocking(move || {
        if let Err(e) = index.save(&path) {
            log::warn!("[LOADER] Failed to persist vector index: {}", e);
        }
        index
    })
    .await?;
    Ok(index)
}

/// Owns the current `AnalyticsSystem` and serialises rebuilds
pub struct DataService {
    config: Config,
    services: Services,
    store: Option<Arc<dyn BlobStore>>,
    current: RwLock<Option<Arc<AnalyticsSystem>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl DataService {
    pub fn new(config: Config, services: Services, store: Option<Arc<dyn BlobStore>>) -> Self {
        Self {
            config,
            services,
            store,
            current: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Production wiring: OpenAI-compatible client, optional directory store
    pub fn from_config(config: Config) -> std::result::Result<Self, String> {
        let services = Services::from_config(&config)?;
        let store = config.blob_store_dir.as_ref().map(|dir| {
            log::info!("[SYNC] Using blob store directory {}", dir.display());
            Arc::new(DirectoryBlobStore::new(dir.clone())) as Arc<dyn BlobStore>
        });
        Ok(Self::new(config, services, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the loaded system, if any
    pub fn current(&self) -> Option<Arc<AnalyticsSystem>> {
        self.current.read().clone()
    }

    /// CSV currently served, falling back to the first local download
    pub fn current_csv(&self) -> Option<PathBuf> {
        if let Some(system) = self.current() {
            return Some(system.source_file.clone());
        }
        crate::sync::local_csv_files(&self.config.download_dir)
            .ok()
            .and_then(|files| files.into_iter().next())
    }

    /// Initial load. `force_rebuild` rebuilds the vector index even for a known file.
    pub async fn startup(&self, force_rebuild: bool) -> Result<SyncOutcome> {
        self.refresh(force_rebuild).await
    }

    /// Pull the newest remote file and rebuild when it changed
    pub async fn sync(&self) -> Result<SyncOutcome> {
        self.refresh(false).await
    }

    async fn refresh(&self, force: bool) -> Result<SyncOutcome> {
        let _guard = self.rebuild_lock.lock().await;

        let outcome = sync_latest_file(
            self.store.as_deref(),
            &self.config.blob_store_prefix,
            &self.config.download_dir,
        )
        .await?;
        let Some(file) = outcome.file.clone() else {
            return Ok(outcome);
        };

        // A previous build may have failed after the download replaced the served file
        let serving = self.current().map(|system| system.source_file.clone());
        let stale = serving.as_deref() != Some(file.as_path());
        if !stale && !outcome.rebuild && !force {
            log::info!("[SYNC] {} unchanged, keeping the loaded system", file.display());
            return Ok(outcome);
        }
        if stale && serving.is_some() && !outcome.rebuild {
            log::warn!("[SYNC] Loaded system is behind {}, rebuilding", file.display());
        }

        let force_index = outcome.rebuild || force || (stale && serving.is_some());
        let system = AnalyticsSystem::build(&self.config, &file, force_index, &self.services).await?;
        if let Some(cache) = &self.services.cache {
            cache.clear();
        }
        *self.current.write() = Some(Arc::new(system));
        log::info!("[SYNC] System ready on {}", file.display());
        Ok(SyncOutcome { loaded: true, ..outcome })
    }
}
