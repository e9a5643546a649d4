//! Integration tests for the duplicate engine and scan pipeline.
//!
//! Covers ordering, concurrency and restart behaviour across the public API.

use std::sync::Arc;

use sleuth_core::{
    DuplicateEngine, DuplicateKind, EngineConfig, FindingKind, HashAlgorithm, HashingEmbedder,
    PerceptualHash, PerceptualHashSet, Registration, ScanPipeline, Severity, Submission,
};
use tokio::sync::Barrier;

const INVOICE: &str = "Invoice #12345, amount 500";

fn embedder() -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new(128))
}

fn hash(bytes: [u8; 8]) -> PerceptualHash {
    PerceptualHash::from_bytes(bytes.to_vec(), HashAlgorithm::PHash64)
}

#[tokio::test]
async fn test_first_submission_unique_second_duplicate() {
    let engine = DuplicateEngine::ephemeral(EngineConfig::default(), embedder()).unwrap();

    let first = engine.check_and_register("a", INVOICE, None).await.unwrap();
    let second = engine.check_and_register("b", INVOICE, None).await.unwrap();

    assert_eq!(first.kind, DuplicateKind::Unique);
    assert_ne!(second.kind, DuplicateKind::Unique);
    assert_eq!(second.matched_submission.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_self_similarity() {
    let engine = DuplicateEngine::ephemeral(EngineConfig::default(), embedder()).unwrap();
    let vector = HashingEmbedder::new(128).embed_sync(INVOICE);

    engine.index().insert(&vector, "a").unwrap();
    let hit = engine.index().search(&vector).unwrap();
    assert!((hit.score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_end_to_end_severity_rises() {
    let engine = DuplicateEngine::ephemeral(EngineConfig::default(), embedder()).unwrap();
    let pipeline = ScanPipeline::builder(Arc::new(engine)).build().unwrap();

    let first = pipeline
        .scan(Submission::new(INVOICE.as_bytes().to_vec()))
        .await;
    let second = pipeline
        .scan(Submission::new(INVOICE.as_bytes().to_vec()))
        .await;

    assert_eq!(first.verdict.severity, Severity::None);
    assert!(second.verdict.severity >= Severity::Low);
    assert!(second.verdict.severity > first.verdict.severity);
    assert!(second.verdict.has(FindingKind::DuplicateNear));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_text_only_one_unique() {
    let engine = Arc::new(DuplicateEngine::ephemeral(EngineConfig::default(), embedder()).unwrap());
    let tasks = 8;
    let barrier = Arc::new(Barrier::new(tasks));

    let handles: Vec<_> = (0..tasks)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                engine
                    .check_and_register(&format!("sub-{i}"), INVOICE, None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut unique = 0;
    for handle in handles {
        if handle.await.unwrap().kind == DuplicateKind::Unique {
            unique += 1;
        }
    }
    assert_eq!(unique, 1);
    assert_eq!(engine.stats().indexed_texts, tasks);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_image_only_one_unique() {
    let engine = Arc::new(DuplicateEngine::ephemeral(EngineConfig::default(), embedder()).unwrap());
    let barrier = Arc::new(Barrier::new(2));
    let image = hash([0xAB; 8]);

    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let image = image.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                engine.check_and_register(id, "", Some(&image)).await.unwrap()
            })
        })
        .collect();

    let mut kinds = Vec::new();
    for handle in handles {
        kinds.push(handle.await.unwrap().kind);
    }
    kinds.sort_by_key(|k| *k as u8);
    assert_eq!(kinds, vec![DuplicateKind::Unique, DuplicateKind::ExactDuplicate]);
    assert_eq!(engine.stats().indexed_hashes, 1);
}

#[test]
fn test_hash_set_check_and_insert_across_threads() {
    let set = Arc::new(PerceptualHashSet::ephemeral(64).unwrap());
    let image = hash([0x11; 8]);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let set = Arc::clone(&set);
            let image = image.clone();
            std::thread::spawn(move || {
                set.check_and_insert(&image, &format!("t{i}"), 0)
                    .unwrap()
                    .prior
                    .is_none()
            })
        })
        .collect();

    let first_seen = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|unique| *unique)
        .count();
    assert_eq!(first_seen, 1);
    assert_eq!(set.len(), 1);
}

#[test]
fn test_hash_insert_idempotent() {
    let set = PerceptualHashSet::ephemeral(64).unwrap();
    let image = hash([0x42; 8]);
    assert!(set.insert(&image, "a").unwrap());
    assert!(!set.insert(&image, "b").unwrap());
    assert!(!set.insert(&image, "c").unwrap());
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn test_reopened_engine_answers_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_data_dir(dir.path());
    let image = hash([7, 6, 5, 4, 3, 2, 1, 0]);
    let query_text = "Invoice 12345 amount 500 paid";

    let before = {
        let engine = DuplicateEngine::open(config.clone(), embedder()).unwrap();
        engine.check_and_register("a", INVOICE, Some(&image)).await.unwrap();
        engine
            .check_and_register("b", "Bank statement March balance 9000", None)
            .await
            .unwrap();
        (
            engine.check(query_text, None).await.unwrap(),
            engine.check("", Some(&image)).await.unwrap(),
            engine.stats(),
        )
    };

    assert!(dir.path().join("vectors.log").exists());
    assert!(dir.path().join("hashes.log").exists());

    let engine = DuplicateEngine::open(config, embedder()).unwrap();
    let after = (
        engine.check(query_text, None).await.unwrap(),
        engine.check("", Some(&image)).await.unwrap(),
        engine.stats(),
    );

    assert_eq!(before, after);
    assert_eq!(after.1.kind, DuplicateKind::ExactDuplicate);
    assert_eq!(after.1.matched_submission.as_deref(), Some("a"));

    let again = engine.check_and_register("c", INVOICE, None).await.unwrap();
    assert_eq!(again.kind, DuplicateKind::NearDuplicate);
    assert_eq!(again.registration, Registration::Committed);
}

#[tokio::test]
async fn test_reopen_with_other_hash_length_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_data_dir(dir.path());
    {
        let engine = DuplicateEngine::open(config.clone(), embedder()).unwrap();
        engine
            .check_and_register("a", "", Some(&hash([1; 8])))
            .await
            .unwrap();
    }

    let wider = EngineConfig {
        hash_bits: 128,
        ..config
    };
    assert!(DuplicateEngine::open(wider, embedder()).is_err());
}
