//! The composition root: one `CoreContext` owns every layer of the engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use anchora::EngineConfig;
use entity::{EntityIndex, EntityTracker};
use ground::{Auditor, GroundingProvider, WorldModel};
use resolve::ContextualResolver;
use session::{SessionManager, SessionStore};
use store::{ChunkRecord, Container, SnapshotMetadata};
use vector::{AnnIndex, ConfidenceCalibrator, Embedder, HashEmbedder, VectorEngine};

use crate::memory_store::MemoryStore;
use crate::skills::SkillsStore;

/// Entries kept in the rolling query audit log.
const AUDIT_LOG_CAP: usize = 1000;

/// One line of the rolling query log behind `index_status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub query: String,
    pub results_count: usize,
    pub abstained: bool,
    pub elapsed_ms: f64,
    pub top_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Counters and the rolling query log.
pub struct EngineStats {
    pub query_count: AtomicU64,
    pub started_at: Instant,
    log: Mutex<Vec<QueryLogEntry>>,
}

impl EngineStats {
    fn new() -> Self {
        Self {
            query_count: AtomicU64::new(0),
            started_at: Instant::now(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, entry: QueryLogEntry) {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.push(entry);
        if log.len() > AUDIT_LOG_CAP {
            let excess = log.len() - AUDIT_LOG_CAP;
            log.drain(..excess);
        }
    }

    pub fn recent(&self, n: usize) -> Vec<QueryLogEntry> {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        let start = log.len().saturating_sub(n);
        log[start..].to_vec()
    }

    pub fn uptime_minutes(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() / 60.0
    }
}

/// Everything a request handler needs, built once at startup and shared
/// read-mostly. Rebuildable pieces (entity index, world model) sit behind
/// `RwLock<Arc<_>>`: a rebuild materialises the new value completely, then
/// swaps the Arc; in-flight readers keep the clone they took.
pub struct CoreContext {
    pub config: EngineConfig,
    pub embedder: Arc<dyn Embedder>,
    /// Chunk records decoded from the snapshot, indexed by `chunk_id`.
    pub chunks: Vec<ChunkRecord>,
    pub snapshot: Option<SnapshotMetadata>,
    pub engine: VectorEngine,
    pub calibrator: ConfidenceCalibrator,
    pub sessions: SessionManager,
    pub entity_index: RwLock<Arc<EntityIndex>>,
    pub tracker: Option<EntityTracker>,
    pub world: RwLock<Arc<WorldModel>>,
    pub world_rebuild_cancel: Arc<AtomicBool>,
    pub auditor: Auditor,
    pub grounding: GroundingProvider,
    pub resolver: ContextualResolver,
    pub budget: budget::TokenBudget,
    pub memories: MemoryStore,
    pub skills: SkillsStore,
    pub stats: EngineStats,
}

impl CoreContext {
    /// Build the engine from configuration: open the snapshot container if
    /// one exists (refusing model or dimension mismatches), reconstruct the
    /// ANN index, load persisted entity state, and scan the truth corpus.
    pub fn build(config: EngineConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let embedder = embedder_for(&config)?;

        // ── Snapshot + vector engine ────────────────────────────────────
        let container_path = config.container_path();
        let (chunks, snapshot, index) = if container_path.exists() {
            let container = Container::open(&container_path, config.embedding.dimension)?;
            let view = container.snapshot();
            if view.metadata.embedding_model != embedder.model_id() {
                anyhow::bail!(
                    "incompatible index: snapshot embedded with '{}', engine embeds with '{}'",
                    view.metadata.embedding_model,
                    embedder.model_id()
                );
            }
            let chunks = view.chunks.to_vec();
            let metadata = view.metadata.clone();
            let index = if view.index_bytes.is_empty() {
                AnnIndex::build(metadata.dimension, view.vectors.as_slice(), config.retrieval.ann)?
            } else {
                AnnIndex::deserialize(view.index_bytes, metadata.chunk_count)?
            };
            // The container's mmap is released here; everything the engine
            // needs has been materialised.
            (chunks, Some(metadata), index)
        } else {
            tracing::warn!(path = %container_path.display(), "no snapshot container, starting empty");
            let index = AnnIndex::build(config.embedding.dimension, &[], config.retrieval.ann)?;
            (Vec::new(), None, index)
        };

        let snapshot_model = snapshot
            .as_ref()
            .map(|m| m.embedding_model.clone())
            .unwrap_or_else(|| embedder.model_id().to_string());
        let engine = VectorEngine::new(embedder.clone(), index, &snapshot_model)?
            .with_max_expansions(config.retrieval.max_expansions);

        // ── Sessions ────────────────────────────────────────────────────
        let session_store = SessionStore::new(config.sessions_dir())?;
        let sessions = SessionManager::new(session_store, config.session.defaults());
        if config.session.retention_days > 0 {
            let swept = sessions.retention_sweep(config.session.retention_days)?;
            if swept > 0 {
                tracing::info!(swept, "startup retention sweep");
            }
        }

        // ── Entity intelligence ─────────────────────────────────────────
        let mut entity_index = EntityIndex::with_default_scanners();
        if config.indexing.enabled {
            entity_index.load(config.entities_path())?;
        }
        let tracker = if config.tracking.enabled {
            let tracker = EntityTracker::new();
            tracker.load(config.tracking_path())?;
            Some(tracker)
        } else {
            None
        };

        // ── World model ─────────────────────────────────────────────────
        let world_rebuild_cancel = Arc::new(AtomicBool::new(false));
        let world = WorldModel::build(
            config.project_context_dir(),
            &embedder,
            &world_rebuild_cancel,
        )?;
        let auditor = Auditor::new(embedder.clone(), config.audit);
        let grounding = GroundingProvider::new(embedder.clone())
            .with_threshold(config.grounding.evidence_threshold);

        let memories = MemoryStore::new(config.memories_dir(), config.memory.per_session);
        let skills = SkillsStore::new(config.skills_dir(), embedder.clone());

        tracing::info!(
            chunks = chunks.len(),
            model = embedder.model_id(),
            truth_facts = world.len(),
            "engine context ready"
        );

        Ok(Self {
            calibrator: ConfidenceCalibrator::new(config.calibration),
            budget: budget::TokenBudget::new(config.budget.max_tokens, config.budget.reserved_tokens),
            resolver: ContextualResolver::new(),
            entity_index: RwLock::new(Arc::new(entity_index)),
            world: RwLock::new(Arc::new(world)),
            world_rebuild_cancel,
            auditor,
            grounding,
            memories,
            skills,
            stats: EngineStats::new(),
            config,
            embedder,
            chunks,
            snapshot,
            engine,
            sessions,
            tracker,
        })
    }

    pub fn chunk(&self, chunk_id: u32) -> Option<&ChunkRecord> {
        self.chunks.iter().find(|c| c.chunk_id == chunk_id)
    }

    /// Current entity index revision.
    pub fn entity_index(&self) -> Arc<EntityIndex> {
        self.entity_index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a freshly built entity index.
    pub fn swap_entity_index(&self, index: EntityIndex) {
        *self.entity_index.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(index);
    }

    /// Current world-model revision.
    pub fn world(&self) -> Arc<WorldModel> {
        self.world.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn swap_world(&self, world: WorldModel) {
        *self.world.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(world);
    }

    pub fn bump_queries(&self) -> u64 {
        self.stats.query_count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn embedder_for(config: &EngineConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    let expected = format!("hash-sin-{}", config.embedding.dimension);
    if config.embedding.model == expected {
        Ok(Arc::new(HashEmbedder::new(config.embedding.dimension)))
    } else {
        anyhow::bail!(
            "unsupported embedding model '{}' (expected '{expected}')",
            config.embedding.model
        )
    }
}
