use std::sync::Arc;
use warren_core::SaveStatus;
use warren_deleter::{DeletionPipeline, PipelineConfig};
use warren_core::StorageError;
use warren_shortener::generator::random::RandomGenerator;
use warren_shortener::generator::seq::SeqGenerator;
use warren_shortener::{Generator, RequestContext, ShortenerError, ShortenerService};
use warren_storage::FileStore;

const BASE_URL: &str = "https://wr.example";

async fn open_service(path: &std::path::Path) -> ShortenerService<FileStore, RandomGenerator> {
    open_with(path, RandomGenerator::new()).await
}

async fn open_with<G: Generator>(
    path: &std::path::Path,
    generator: G,
) -> ShortenerService<FileStore, G> {
    let store = Arc::new(FileStore::open(path).await.unwrap());
    let pipeline = DeletionPipeline::start(PipelineConfig::default(), Arc::clone(&store)).unwrap();
    ShortenerService::new(store, generator, pipeline, BASE_URL)
}

#[tokio::test]
async fn deletes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.jsonl");
    let alice = RequestContext::for_owner("alice").unwrap();

    let service = open_service(&path).await;
    let urls = vec![
        "https://a.com".to_string(),
        "https://b.com".to_string(),
    ];
    let created = service.shorten_batch(&alice, &urls).await.unwrap();
    assert!(created.iter().all(|s| s.status == SaveStatus::Created));
    assert!(created[0].short_url.starts_with("https://wr.example/"));

    assert!(service.delete_urls(&alice, vec![created[0].short_id.clone()]));
    service.close().await;
    drop(service);

    let reopened = open_service(&path).await;
    let gone = reopened.resolve(&created[0].short_id).await.unwrap().unwrap();
    let kept = reopened.resolve(&created[1].short_id).await.unwrap().unwrap();
    assert!(gone.deleted);
    assert!(!kept.deleted);
    assert_eq!(kept.original_url, "https://b.com");

    let again = reopened
        .shorten(&RequestContext::for_owner("bob").unwrap(), "https://b.com")
        .await
        .unwrap();
    assert_eq!(again.status, SaveStatus::AlreadyExists);
    assert_eq!(again.short_id, created[1].short_id);

    let listed = reopened.user_urls(&alice).await.unwrap();
    assert_eq!(listed.len(), 2);
    reopened.close().await;
}

#[tokio::test]
async fn seq_generator_needs_an_offset_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.jsonl");
    let alice = RequestContext::for_owner("alice").unwrap();

    let first = open_with(&path, SeqGenerator::with_prefix("wr")).await;
    let one = first.shorten(&alice, "https://one.com").await.unwrap();
    assert_eq!(one.short_id.as_str(), "wr000000");
    first.close().await;
    drop(first);

    let restarted = open_with(&path, SeqGenerator::with_prefix("wr")).await;
    let err = restarted.shorten(&alice, "https://two.com").await.unwrap_err();
    assert!(matches!(
        err,
        ShortenerError::Storage(StorageError::DuplicateShortId(_))
    ));
    restarted.close().await;
    drop(restarted);

    let offset = open_with(&path, SeqGenerator::with_offset("wr", 1000)).await;
    let two = offset.shorten(&alice, "https://two.com").await.unwrap();
    assert_eq!(two.short_id.as_str(), "wr001000");
    assert_eq!(two.status, SaveStatus::Created);
    assert_eq!(offset.user_urls(&alice).await.unwrap().len(), 2);
    offset.close().await;
}
