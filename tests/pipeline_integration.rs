//! Library-level composition, no server in the loop: container → engine →
//! resolver → auditor wired by hand the way an embedding pipeline would.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use ground::{AuditConfig, AuditStatus, Auditor, GroundingProvider, WorldModel};
use resolve::ContextualResolver;
use session::{TurnMetadata, TurnRecord};
use store::{ChunkRecord, CompressionSpec, Container};
use vector::{AnnConfig, AnnIndex, Embedder, HashEmbedder, VectorEngine};

#[test]
fn index_then_search_through_the_full_stack() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("context_vectors.acx");
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));

    let texts = [
        "def login(user): return verify(user)",
        "def logout(user): session.drop(user)",
        "class Billing: pass",
    ];
    let mut vectors = Vec::new();
    let chunks: Vec<ChunkRecord> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            vectors.extend(embedder.embed(text));
            ChunkRecord::new(i as u32, format!("src/m{i}.py"), 1, 4, None, *text)
        })
        .collect();
    let index = AnnIndex::build(64, &vectors, AnnConfig::default()).unwrap();

    Container::write_snapshot(
        &path,
        &chunks,
        &vectors,
        64,
        &index.serialize().unwrap(),
        embedder.model_id(),
        CompressionSpec::f16(),
    )
    .unwrap();

    // Reload the container the way a fresh process would.
    let container = Container::open(&path, 64).unwrap();
    let view = container.snapshot();
    let restored = AnnIndex::deserialize(view.index_bytes, view.chunks.len()).unwrap();
    let engine = VectorEngine::new(embedder.clone(), restored, &view.metadata.embedding_model).unwrap();

    let q = engine.embed_query("def login(user): return verify(user)");
    let hits = engine.search(&q, 1).unwrap();
    assert_eq!(hits[0].chunk_id, 0);
    assert!(hits[0].score > 0.99);
}

#[test]
fn engine_refuses_a_foreign_snapshot() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let index = AnnIndex::build(64, &[], AnnConfig::default()).unwrap();
    let err = VectorEngine::new(embedder, index, "all-MiniLM-L6-v2").unwrap_err();
    assert!(matches!(err, vector::VectorError::IncompatibleIndex { .. }));
}

#[test]
fn resolver_plus_engine_answers_referential_queries() {
    let resolver = ContextualResolver::new();
    let history = vec![TurnRecord::new(
        1,
        "show process_payment()",
        "process_payment is the function that charges the card",
        TurnMetadata {
            entities: vec!["process_payment".to_string()],
            files: vec![],
        },
    )];

    let (rewritten, resolved) = resolver.resolve(
        "add retries to that function",
        &history,
        None,
        None,
    );
    assert!(rewritten.contains("process_payment"));
    assert_eq!(resolved.len(), 1);

    // The rewritten query is what retrieval sees.
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let engine = VectorEngine::new(
        embedder,
        AnnIndex::build(64, &[], AnnConfig::default()).unwrap(),
        "hash-sin-64",
    )
    .unwrap();
    let (hits, variants) = engine.search_with_mvr(&rewritten, 5).unwrap();
    assert!(hits.is_empty());
    assert!(variants.iter().any(|v| v.contains("process_payment")));
}

#[test]
fn world_model_feeds_audit_and_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("project_context");
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::write(
        corpus.join("rules.md"),
        "# Storage\nEvery snapshot is immutable once written.\n\n# Style\nKeep modules small.\n",
    )
    .unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let model = WorldModel::build(&corpus, &embedder, &AtomicBool::new(false)).unwrap();
    assert_eq!(model.len(), 2);

    let auditor = Auditor::new(embedder.clone(), AuditConfig::default());
    // Querying a fact with its own text guarantees a top anchor above the
    // threshold; proposing the same text aligns perfectly.
    let text = "Storage\nEvery snapshot is immutable once written.";
    let report = auditor.audit(&model, text, text);
    assert_eq!(report.status, AuditStatus::Trusted);
    assert!(report.score > 0.9);
    assert_eq!(report.anchors[0], "rules.md");

    let provider = GroundingProvider::new(embedder);
    let evidence = provider.evidence(&model, text, 3);
    assert!(evidence.contains("--- Evidence from rules.md"));
    assert!(evidence.contains("immutable"));
}
