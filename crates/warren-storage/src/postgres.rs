use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use warren_core::store::Result;
use warren_core::{
    BatchItem, BatchOutcome, OwnerId, SaveStatus, Saved, ShortId, StorageError, UrlRecord,
    UrlStore,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Inserts unless the URL is already known. Returns no row on conflict.
const INSERT_URL: &str = r#"
    INSERT INTO urls (short_id, original_url, owner_id)
    VALUES ($1, $2, $3)
    ON CONFLICT (original_url) DO NOTHING
    RETURNING short_id
"#;

const SELECT_ID_BY_URL: &str = r#"
    SELECT short_id
    FROM urls
    WHERE original_url = $1
"#;

/// PostgreSQL implementation of the store contract.
///
/// Dedup is enforced by the `UNIQUE (original_url)` constraint. A save is a
/// conditional insert that does nothing on conflict, followed by a lookup of
/// the winning row, so concurrent writers in different processes agree on a
/// single short id without any application-level lock. Deletes only flip
/// `is_deleted`; rows are never removed.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store from an existing pool. The schema is expected to be
    /// in place already; see [`PostgresStore::migrate`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool, then brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        info!("connected to postgres");

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Runs the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        info!("postgres migrations applied");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// Creates `url` under `id`, or returns whichever id already owns `url`.
///
/// The insert only ignores conflicts on `original_url`; reusing a short id
/// for a different URL trips the primary key and fails the call.
async fn insert_or_lookup(
    conn: &mut PgConnection,
    owner: &OwnerId,
    id: &ShortId,
    url: &str,
) -> Result<Saved> {
    let inserted = sqlx::query(INSERT_URL)
        .bind(id.as_str())
        .bind(url)
        .bind(owner.as_str())
        .fetch_optional(&mut *conn)
        .await;

    let inserted = match inserted {
        Ok(row) => row,
        Err(err) if is_unique_violation(&err) => {
            return Err(StorageError::DuplicateShortId(id.to_string()))
        }
        Err(err) => return Err(map_sqlx_error(err)),
    };

    if let Some(row) = inserted {
        let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
        return Ok(Saved::created(ShortId::new_unchecked(short_id)));
    }

    let existing = sqlx::query(SELECT_ID_BY_URL)
        .bind(url)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| {
            StorageError::InvalidData(format!("conflicting row for '{url}' is not visible"))
        })?;
    let short_id: String = existing.try_get("short_id").map_err(map_sqlx_error)?;
    Ok(Saved::existing(ShortId::new_unchecked(short_id)))
}

#[async_trait]
impl UrlStore for PostgresStore {
    async fn save(&self, owner: &OwnerId, proposed_id: &ShortId, url: &str) -> Result<Saved> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        insert_or_lookup(&mut conn, owner, proposed_id, url).await
    }

    async fn save_batch(&self, owner: &OwnerId, items: &[BatchItem]) -> Result<BatchOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut outcome = BatchOutcome::default();

        for item in items {
            // Returning early drops `tx`, which rolls the whole batch back.
            let saved = insert_or_lookup(&mut tx, owner, &item.short_id, &item.original_url).await?;
            let bucket = match saved.status {
                SaveStatus::Created => &mut outcome.created,
                SaveStatus::AlreadyExists => &mut outcome.existing,
            };
            bucket.insert(item.original_url.clone(), saved.short_id);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(
            owner = %owner,
            created = outcome.created.len(),
            existing = outcome.existing.len(),
            "batch committed"
        );
        Ok(outcome)
    }

    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT original_url, owner_id, is_deleted
            FROM urls
            WHERE short_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        let owner_id: String = row.try_get("owner_id").map_err(map_sqlx_error)?;
        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

        Ok(Some(UrlRecord {
            short_id: id.clone(),
            original_url,
            owner_id: OwnerId::new_unchecked(owner_id),
            deleted,
        }))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<BatchItem>> {
        let rows = sqlx::query(
            r#"
            SELECT short_id, original_url
            FROM urls
            WHERE owner_id = $1
            ORDER BY seq
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
                let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
                Ok(BatchItem::new(ShortId::new_unchecked(short_id), original_url))
            })
            .collect()
    }

    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();

        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE owner_id = $1
              AND short_id = ANY($2)
              AND NOT is_deleted
            "#,
        )
        .bind(owner.as_str())
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(owner = %owner, rows = result.rows_affected(), "marked urls deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
