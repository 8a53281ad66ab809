use crate::context::RequestContext;
use crate::error::{Result, ShortenerError};
use crate::generator::Generator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use warren_core::{BatchItem, DeleteTask, SaveStatus, ShortId, StorageError, UrlRecord, UrlStore};
use warren_deleter::DeletionPipeline;

/// The outcome of shortening one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub original_url: String,
    pub short_id: ShortId,
    pub short_url: String,
    pub status: SaveStatus,
}

/// Request-facing facade over a store, a generator and the deletion
/// pipeline.
///
/// Creates and reads go straight to the store. Deletes only ever go
/// through the pipeline. The generator is responsible for uniqueness;
/// no collision retry is performed.
pub struct ShortenerService<S, G> {
    store: Arc<S>,
    generator: G,
    pipeline: DeletionPipeline,
    base_url: String,
}

impl<S: UrlStore, G: Generator> ShortenerService<S, G> {
    /// `pipeline` should already be wired to the same `store`.
    pub fn new(
        store: Arc<S>,
        generator: G,
        pipeline: DeletionPipeline,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            generator,
            pipeline,
            base_url: base_url.into(),
        }
    }

    /// Validates that the URL has an http(s) scheme and a host.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a scheme and host: {url}"
            )));
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit('@').next().unwrap_or_default();
        if host.is_empty() || host.starts_with(':') {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {url}"
            )));
        }

        Ok(())
    }

    pub fn short_url(&self, id: &ShortId) -> String {
        id.to_url(&self.base_url)
    }

    fn shortened(&self, url: &str, short_id: ShortId, status: SaveStatus) -> Shortened {
        Shortened {
            original_url: url.to_string(),
            short_url: self.short_url(&short_id),
            short_id,
            status,
        }
    }

    /// Shortens one URL. A URL that was shortened before, by anyone, comes
    /// back with its existing id and [`SaveStatus::AlreadyExists`].
    pub async fn shorten(&self, ctx: &RequestContext, url: &str) -> Result<Shortened> {
        Self::validate_url(url)?;

        let proposed = self.generator.generate();
        let saved = self.store.save(ctx.owner(), &proposed, url).await?;
        debug!(owner = %ctx.owner(), short_id = %saved.short_id, status = ?saved.status, "shortened url");

        Ok(self.shortened(url, saved.short_id, saved.status))
    }

    /// Shortens several URLs in one atomic store call.
    ///
    /// Results follow the input order. A URL repeated in the input is
    /// reported as existing from its second occurrence on.
    pub async fn shorten_batch(
        &self,
        ctx: &RequestContext,
        urls: &[String],
    ) -> Result<Vec<Shortened>> {
        for url in urls {
            Self::validate_url(url)?;
        }

        let items: Vec<BatchItem> = urls
            .iter()
            .map(|url| BatchItem::new(self.generator.generate(), url.as_str()))
            .collect();
        let outcome = self.store.save_batch(ctx.owner(), &items).await?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            let first = seen.insert(url.as_str());
            let (short_id, status) = match (outcome.created.get(url), outcome.existing.get(url)) {
                (Some(id), _) if first => (id.clone(), SaveStatus::Created),
                (Some(id), _) | (None, Some(id)) => (id.clone(), SaveStatus::AlreadyExists),
                (None, None) => {
                    return Err(StorageError::InvalidData(format!(
                        "batch outcome is missing '{url}'"
                    ))
                    .into())
                }
            };
            results.push(self.shortened(url, short_id, status));
        }

        debug!(
            owner = %ctx.owner(),
            created = outcome.created.len(),
            existing = outcome.existing.len(),
            "shortened batch"
        );
        Ok(results)
    }

    /// Looks up a short id. Deleted records are returned with
    /// `deleted = true`.
    pub async fn resolve(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.store.get(id).await?)
    }

    pub async fn user_urls(&self, ctx: &RequestContext) -> Result<Vec<BatchItem>> {
        Ok(self.store.user_urls(ctx.owner()).await?)
    }

    /// Queues a soft-delete of `ids` on behalf of the caller.
    ///
    /// Returns `false` if the pipeline dropped the request. Ids the caller
    /// does not own are ignored when the batch is applied.
    pub fn delete_urls(&self, ctx: &RequestContext, ids: Vec<ShortId>) -> bool {
        if ids.is_empty() {
            return true;
        }
        let count = ids.len();
        let accepted = self
            .pipeline
            .enqueue(DeleteTask::new(ctx.owner().clone(), ids));
        debug!(owner = %ctx.owner(), ids = count, accepted, "delete requested");
        accepted
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    /// Flushes pending deletes and stops the pipeline.
    pub async fn close(&self) {
        self.pipeline.close().await;
        info!("shortener service closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seq::SeqGenerator;
    use warren_deleter::PipelineConfig;
    use warren_storage::InMemoryStore;

    const BASE_URL: &str = "http://localhost:8080";

    fn test_service() -> ShortenerService<InMemoryStore, SeqGenerator> {
        let store = Arc::new(InMemoryStore::new());
        let pipeline =
            DeletionPipeline::start(PipelineConfig::default(), Arc::clone(&store)).unwrap();
        ShortenerService::new(store, SeqGenerator::with_prefix("wr"), pipeline, BASE_URL)
    }

    fn ctx(owner: &str) -> RequestContext {
        RequestContext::for_owner(owner).unwrap()
    }

    #[tokio::test]
    async fn shorten_creates_and_renders_short_url() {
        let service = test_service();

        let shortened = service
            .shorten(&ctx("alice"), "https://example.com")
            .await
            .unwrap();

        assert_eq!(shortened.short_id.as_str(), "wr000000");
        assert_eq!(shortened.short_url, "http://localhost:8080/wr000000");
        assert_eq!(shortened.status, SaveStatus::Created);
    }

    #[tokio::test]
    async fn shorten_same_url_returns_existing_id() {
        let service = test_service();

        let first = service
            .shorten(&ctx("alice"), "https://a.com")
            .await
            .unwrap();
        let second = service.shorten(&ctx("bob"), "https://a.com").await.unwrap();

        assert_eq!(second.short_id, first.short_id);
        assert_eq!(second.status, SaveStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn shorten_rejects_invalid_urls() {
        let service = test_service();

        for url in ["", "not-a-url", "ftp://example.com", "https://", "http:///path"] {
            let err = service.shorten(&ctx("alice"), url).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn shorten_accepts_hosts_with_ports_and_paths() {
        let service = test_service();

        for url in [
            "http://localhost:3000/x",
            "HTTPS://Example.com?q=1",
            "https://user@example.com/a#b",
        ] {
            assert!(service.shorten(&ctx("alice"), url).await.is_ok(), "{url}");
        }
    }

    #[tokio::test]
    async fn shorten_batch_keeps_input_order() {
        let service = test_service();
        service
            .shorten(&ctx("bob"), "https://old.com")
            .await
            .unwrap();

        let urls = vec![
            "https://one.com".to_string(),
            "https://old.com".to_string(),
            "https://one.com".to_string(),
        ];
        let results = service.shorten_batch(&ctx("alice"), &urls).await.unwrap();

        let statuses: Vec<SaveStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                SaveStatus::Created,
                SaveStatus::AlreadyExists,
                SaveStatus::AlreadyExists
            ]
        );
        assert_eq!(results[0].short_id, results[2].short_id);
        assert_eq!(results[1].short_id.as_str(), "wr000000");
    }

    #[tokio::test]
    async fn shorten_batch_validates_everything_first() {
        let service = test_service();

        let urls = vec!["https://ok.com".to_string(), "bad".to_string()];
        let err = service
            .shorten_batch(&ctx("alice"), &urls)
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(service.user_urls(&ctx("alice")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_is_none() {
        let service = test_service();

        let record = service
            .resolve(&ShortId::new("nonexistent").unwrap())
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn delete_only_touches_owned_urls() {
        let service = test_service();
        let mine = service
            .shorten(&ctx("alice"), "https://mine.com")
            .await
            .unwrap();
        let theirs = service
            .shorten(&ctx("bob"), "https://theirs.com")
            .await
            .unwrap();

        assert!(service.delete_urls(
            &ctx("alice"),
            vec![mine.short_id.clone(), theirs.short_id.clone()]
        ));
        service.close().await;

        let mine = service.resolve(&mine.short_id).await.unwrap().unwrap();
        let theirs = service.resolve(&theirs.short_id).await.unwrap().unwrap();
        assert!(mine.deleted);
        assert!(!theirs.deleted);
    }

    #[tokio::test]
    async fn delete_after_close_is_dropped() {
        let service = test_service();
        service.close().await;

        assert!(!service.delete_urls(&ctx("alice"), vec![ShortId::new("x").unwrap()]));
        assert!(service.delete_urls(&ctx("alice"), vec![]));
    }

    #[tokio::test]
    async fn user_urls_lists_own_urls_in_order() {
        let service = test_service();
        let alice = ctx("alice");

        service.shorten(&alice, "https://1.com").await.unwrap();
        service.shorten(&ctx("bob"), "https://2.com").await.unwrap();
        service.shorten(&alice, "https://3.com").await.unwrap();

        let urls: Vec<String> = service
            .user_urls(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.original_url)
            .collect();
        assert_eq!(urls, vec!["https://1.com", "https://3.com"]);
    }

    #[tokio::test]
    async fn ping_reaches_the_store() {
        assert!(test_service().ping().await.is_ok());
    }
}
