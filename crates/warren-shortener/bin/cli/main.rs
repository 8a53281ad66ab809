mod cli;

use crate::cli::{Command, GeneratorArg, LogFormat, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warren_core::{SaveStatus, ShortId, UrlStore};
use warren_deleter::DeletionPipeline;
use warren_shortener::generator::random::RandomGenerator;
use warren_shortener::generator::seq::SeqGenerator;
use warren_shortener::{Generator, RequestContext, ShortenerService};
use warren_storage::{FileStore, InMemoryStore, PostgresStore};

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);
    config.validate()?;

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        "starting warren"
    );

    match config.storage {
        StorageBackendArg::Memory => run(config, InMemoryStore::new()).await,
        StorageBackendArg::File => {
            let store = FileStore::open(&config.file_storage_path)
                .await
                .with_context(|| {
                    format!("failed to open {}", config.file_storage_path.display())
                })?;
            run(config, store).await
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .as_deref()
                .context("database dsn is required when storage backend is postgres")?;
            let store = PostgresStore::connect(dsn)
                .await
                .context("failed to connect to postgres")?;
            run(config, store).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays scriptable.
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run<S: UrlStore>(config: CLI, store: S) -> anyhow::Result<()> {
    match config.generator {
        GeneratorArg::Random => execute(config, store, RandomGenerator::new()).await,
        GeneratorArg::Seq => {
            let generator = SeqGenerator::with_offset(
                config.generator_prefix.clone(),
                config.generator_offset.unwrap_or_default(),
            );
            execute(config, store, generator).await
        }
    }
}

async fn execute<S: UrlStore, G: Generator>(
    config: CLI,
    store: S,
    generator: G,
) -> anyhow::Result<()> {
    let store = Arc::new(store);
    let pipeline = DeletionPipeline::start(config.pipeline_config(), Arc::clone(&store))?;
    let service = ShortenerService::new(store, generator, pipeline, config.base_url);

    let outcome = dispatch(&service, config.command).await;
    // Pending deletes are flushed even when the command itself failed.
    service.close().await;
    outcome
}

async fn dispatch<S: UrlStore, G: Generator>(
    service: &ShortenerService<S, G>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Shorten { owner, urls } => {
            let ctx = RequestContext::for_owner(owner)?;
            let results = match urls.as_slice() {
                [url] => vec![service.shorten(&ctx, url).await?],
                _ => service.shorten_batch(&ctx, &urls).await?,
            };
            for shortened in results {
                let status = match shortened.status {
                    SaveStatus::Created => "created",
                    SaveStatus::AlreadyExists => "existing",
                };
                println!(
                    "{}\t{}\t{}",
                    shortened.short_url, status, shortened.original_url
                );
            }
        }
        Command::Resolve { short_id } => {
            let id = ShortId::new(short_id)?;
            match service.resolve(&id).await? {
                None => println!("not found"),
                Some(record) if record.deleted => println!("deleted"),
                Some(record) => println!("{}", record.original_url),
            }
        }
        Command::List { owner } => {
            let ctx = RequestContext::for_owner(owner)?;
            for item in service.user_urls(&ctx).await? {
                println!(
                    "{}\t{}",
                    service.short_url(&item.short_id),
                    item.original_url
                );
            }
        }
        Command::Delete { owner, short_ids } => {
            let ctx = RequestContext::for_owner(owner)?;
            let ids = short_ids
                .into_iter()
                .map(ShortId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let count = ids.len();
            if service.delete_urls(&ctx, ids) {
                println!("queued {count} id(s) for deletion");
            } else {
                anyhow::bail!("deletion queue is full, request dropped");
            }
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }

    Ok(())
}
