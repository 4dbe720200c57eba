//! Composition root for the `convocore` MCP server binary.
//!
//! Reads [`CoreConfig`] from the environment, wires every concrete provider
//! (`convocore-providers`) behind the domain's port traits, builds the
//! application-layer use cases (`convocore-application`), and assembles a
//! [`ToolGateway`] plus a [`Scheduler`] sharing them — mirroring spec.md §9's
//! "one core context value constructed at startup" re-architecture note: no
//! ambient globals, everything built here and passed down explicitly.

pub mod args;

use std::path::PathBuf;
use std::sync::Arc;

use convocore_application::{
    ConversationParser, HierarchyEngine, HierarchyEngineConfig, IndexingDecisionConfig, IndexingDecisionService,
    Scheduler, SchedulerHandle, SemanticSearch, SkeletonCache, StorageLocator, ToolGateway, VectorIndexer,
    VectorIndexerConfig,
};
use convocore_domain::error::Result;
use convocore_domain::events::SharedEventPublisher;
use convocore_domain::ports::{EmbeddingProvider, MetricsProvider, SkeletonStore, StorageIo, VectorStoreProvider};
use convocore_domain::value_objects::CollectionId;
use convocore_domain::value_objects::config::CoreConfig;
use convocore_providers::cache::{InMemorySkeletonStore, MokaSkeletonStore};
use convocore_providers::embedding::{DeterministicEmbeddingProvider, HttpEmbeddingProvider};
use convocore_providers::events::BroadcastEventPublisher;
use convocore_providers::fs::TokioStorageIo;
use convocore_providers::indexing_sidecar::FileIndexingSidecar;
use convocore_providers::metrics::PrometheusMetricsProvider;
use convocore_providers::vector_store::InMemoryVectorStore;

const DEFAULT_COLLECTION_NAME: &str = "convocore_tasks";

/// Every long-lived service the binary holds onto.
pub struct CoreContext {
    /// The unified tool gateway, handed to [`convocore_server::ConvocoreServer`].
    pub gateway: Arc<ToolGateway>,
    /// Handle to the already-spawned background scheduler.
    pub scheduler_handle: SchedulerHandle,
    /// The scheduler itself, exposed for a one-shot `--tick-once` run.
    pub scheduler: Arc<Scheduler>,
    /// In-process event bus; subscribe for a `--watch`-style CLI, otherwise unused.
    pub events: Arc<BroadcastEventPublisher>,
}

/// Closed, ordered list of platform-conventional `globalStorage` locations
/// for VS Code-family extensions, used when neither `STORAGE_ROOTS` nor
/// `--storage-root` names anything. The host extension's on-disk layout is
/// an input to this system, not a design choice of it (spec.md §1); the
/// specific extension id is intentionally not hardcoded to one fork.
fn default_storage_roots() -> Vec<String> {
    const EXTENSION_IDS: &[&str] = &[
        "rooveterinaryinc.roo-cline",
        "saoudrizwan.claude-dev",
        "kilocode.kilo-code",
    ];
    const EDITOR_GLOBAL_STORAGE_DIRS: &[&str] = &[
        "Code/User/globalStorage",
        "Code - Insiders/User/globalStorage",
        "Cursor/User/globalStorage",
        "Windsurf/User/globalStorage",
        "VSCodium/User/globalStorage",
    ];

    let Some(config_dir) = dirs::config_dir() else {
        return Vec::new();
    };
    let mut roots = Vec::new();
    for editor_dir in EDITOR_GLOBAL_STORAGE_DIRS {
        for extension_id in EXTENSION_IDS {
            roots.push(config_dir.join(editor_dir).join(extension_id).display().to_string());
        }
    }
    roots
}

fn default_manifest_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("convocore")
        .join("cache_manifest.json")
}

fn default_sidecar_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("convocore")
        .join("indexing_sidecar.json")
}

/// Resolves `HIERARCHY_MIN_PREFIX_LEN`/`HIERARCHY_PROXIMITY_WINDOW_MS`
/// directly from the environment: these two tuning knobs are consumed only
/// by the hierarchy engine and aren't part of `CoreConfig`'s persisted
/// shape, so they're read here rather than growing that struct.
fn hierarchy_engine_config() -> HierarchyEngineConfig {
    let mut config = HierarchyEngineConfig::default();
    if let Ok(raw) = std::env::var("HIERARCHY_MIN_PREFIX_LEN")
        && let Ok(value) = raw.parse()
    {
        config.min_prefix_len = value;
    }
    if let Ok(raw) = std::env::var("HIERARCHY_PROXIMITY_WINDOW_MS")
        && let Ok(value) = raw.parse()
    {
        config.proximity_window_ms = value;
    }
    config
}

fn build_embedding_provider(config: &CoreConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "memory" => Ok(Arc::new(DeterministicEmbeddingProvider::new(
            config.embedding.dimensions.unwrap_or(8),
        ))),
        provider_name => {
            let base_url = config
                .embedding
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1".to_owned());
            let static_name: &'static str = Box::leak(provider_name.to_owned().into_boxed_str());
            let provider = HttpEmbeddingProvider::new(
                base_url,
                config.embedding.api_key.clone(),
                config.embedding.model.clone(),
                config.embedding.dimensions.unwrap_or(1536),
                static_name,
            )?;
            Ok(Arc::new(provider))
        }
    }
}

fn build_vector_store(config: &CoreConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    match config.vector_store.provider.as_str() {
        #[cfg(feature = "vectorstore-qdrant")]
        "qdrant" => {
            let url = config
                .vector_store
                .address
                .clone()
                .unwrap_or_else(|| "http://localhost:6334".to_owned());
            let store = convocore_providers::vector_store::QdrantVectorStore::connect(
                &url,
                config.vector_store.token.as_deref(),
            )?;
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

fn build_skeleton_store(config: &CoreConfig) -> Arc<dyn SkeletonStore> {
    match config.cache.provider.as_str() {
        "memory" => Arc::new(InMemorySkeletonStore::new()),
        _ => Arc::new(MokaSkeletonStore::new(config.cache.max_size.unwrap_or(10_000) as u64)),
    }
}

/// Builds every provider and use case and wires them into a [`CoreContext`],
/// spawning the background scheduler. Loads the skeleton cache's persisted
/// manifest before returning, per spec.md §4.C.
///
/// # Errors
///
/// Surfaces provider construction failures (`HttpEmbeddingProvider::new`'s
/// HTTP client build, `QdrantVectorStore::connect`'s channel build) as
/// `Error::Embedding`/`Error::VectorDb`.
pub async fn build_core_context(config: CoreConfig, cli: &args::Cli) -> Result<CoreContext> {
    let storage: Arc<dyn StorageIo> = Arc::new(TokioStorageIo::new());
    let events = Arc::new(BroadcastEventPublisher::new());
    let metrics: Option<Arc<dyn MetricsProvider>> = Some(Arc::new(PrometheusMetricsProvider::new()));

    let mut storage_roots = config.storage_roots.clone();
    storage_roots.extend(cli.storage_roots.iter().cloned());
    if storage_roots.is_empty() {
        storage_roots = default_storage_roots();
    }

    let manifest_path = cli
        .cache_manifest_path
        .clone()
        .or_else(|| std::env::var("CACHE_MANIFEST_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(default_manifest_path);

    let skeleton_store = build_skeleton_store(&config);
    let cache = Arc::new(SkeletonCache::new(
        skeleton_store,
        Arc::clone(&storage),
        manifest_path,
        storage_roots.clone(),
    ));
    cache.load_manifest().await;

    let embedding = build_embedding_provider(&config)?;
    let vector_store = build_vector_store(&config)?;
    let collection = config
        .vector_store
        .collection
        .as_deref()
        .map(CollectionId::from_name)
        .unwrap_or_else(|| CollectionId::from_name(DEFAULT_COLLECTION_NAME));

    let sidecar_path = std::env::var("INDEXING_SIDECAR_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_sidecar_path());
    let sidecar = Arc::new(FileIndexingSidecar::new(Arc::clone(&storage), sidecar_path));
    sidecar.load().await;

    let decision_config = IndexingDecisionConfig {
        min_reindex_interval_ms: config.min_reindex_interval_ms,
        max_reindex_interval_ms: config.max_reindex_interval_ms,
    };
    let gateway_decisions = Arc::new(IndexingDecisionService::new(Arc::clone(&sidecar), decision_config));
    let scheduler_decisions = IndexingDecisionService::new(sidecar, decision_config);

    let hierarchy_config = hierarchy_engine_config();

    let gateway_indexer = Arc::new(VectorIndexer::new(
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
        metrics.clone(),
        VectorIndexerConfig::default(),
    ));
    let scheduler_indexer = VectorIndexer::new(
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
        metrics.clone(),
        VectorIndexerConfig::default(),
    );

    let search = Arc::new(SemanticSearch::new(
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
        Arc::clone(&cache),
        metrics.clone(),
    ));

    let locator = StorageLocator::new(Arc::clone(&storage), storage_roots);
    let parser = ConversationParser::new(Arc::clone(&storage));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&cache),
        HierarchyEngine::new(hierarchy_config),
        scheduler_decisions,
        scheduler_indexer,
        parser.clone(),
        collection.clone(),
        Some(Arc::clone(&events) as SharedEventPublisher),
        config.scheduler_interval_ms,
    ));
    let scheduler_handle = Arc::clone(&scheduler).spawn();

    let gateway = Arc::new(ToolGateway::new(
        cache,
        HierarchyEngine::new(hierarchy_config),
        gateway_decisions,
        gateway_indexer,
        search,
        locator,
        parser,
        collection,
        metrics,
        Some(Arc::clone(&events) as SharedEventPublisher),
    ));

    Ok(CoreContext {
        gateway,
        scheduler_handle,
        scheduler,
        events,
    })
}
