use crate::index::Index;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use warren_core::store::Result;
use warren_core::{
    BatchItem, BatchOutcome, OwnerId, Saved, ShortId, StorageError, UrlRecord, UrlStore,
};

/// One line of the write-ahead log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LogEntry {
    seq: u64,
    short_id: ShortId,
    original_url: String,
    #[serde(default = "unowned")]
    owner_id: OwnerId,
    deleted: bool,
}

fn unowned() -> OwnerId {
    OwnerId::new_unchecked("")
}

impl LogEntry {
    fn into_record(self) -> UrlRecord {
        UrlRecord {
            short_id: self.short_id,
            original_url: self.original_url,
            owner_id: self.owner_id,
            deleted: self.deleted,
        }
    }
}

#[derive(Debug)]
struct LogState {
    index: Index,
    file: File,
    last_seq: u64,
    /// Set when the log may end in a partial line.
    torn: bool,
}

impl LogState {
    fn entry(&mut self, record: &UrlRecord) -> LogEntry {
        self.last_seq += 1;
        LogEntry {
            seq: self.last_seq,
            short_id: record.short_id.clone(),
            original_url: record.original_url.clone(),
            owner_id: record.owner_id.clone(),
            deleted: record.deleted,
        }
    }

    /// Appends `entries` as newline-delimited JSON in a single write.
    ///
    /// On failure the log is cut back to its previous length and the
    /// sequence counter is rolled back; the caller must not touch the index.
    async fn append(&mut self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let first_seq = entries[0].seq;

        let mut buf = Vec::new();
        if self.torn {
            buf.push(b'\n');
        }
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)
                .map_err(|e| StorageError::InvalidData(format!("cannot encode log entry: {e}")))?;
            buf.push(b'\n');
        }

        let len_before = self.file.metadata().await?.len();
        let written = async {
            self.file.write_all(&buf).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        if let Err(err) = written {
            self.last_seq = first_seq - 1;
            self.rollback(len_before).await;
            return Err(StorageError::Io(err));
        }
        self.torn = false;
        Ok(())
    }

    /// Drops whatever part of a failed append reached the file.
    async fn rollback(&mut self, len: u64) {
        let truncated = async {
            self.file.set_len(len).await?;
            self.file.sync_data().await
        }
        .await;

        match truncated {
            Ok(()) => debug!(len, "rolled back failed log append"),
            Err(err) => {
                // Replay keeps the first id bound to a URL, so a leftover
                // entry cannot rebind it.
                warn!(error = %err, len, "cannot roll back failed log append");
                self.torn = true;
            }
        }
    }
}

/// [`UrlStore`] backed by an append-only JSON-lines log.
///
/// Every mutation is appended to the log before the in-memory maps change,
/// under the same write lock. Opening the store replays the log from the
/// start; the last entry for a short id decides its URL and deleted flag.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<LogState>,
}

impl FileStore {
    /// Opens (or creates) the log at `path` and replays it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let (index, last_seq) = replay(&contents);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // A torn final line must not swallow the next appended entry.
        let torn = contents.last().is_some_and(|b| *b != b'\n');
        if torn {
            warn!(path = %path.display(), "log does not end with a newline");
        }

        info!(
            path = %path.display(),
            records = index.len(),
            last_seq,
            "file store initialized"
        );

        Ok(Self {
            path,
            state: RwLock::new(LogState {
                index,
                file,
                last_seq,
                torn,
            }),
        })
    }

    /// Returns the location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(contents: &[u8]) -> (Index, u64) {
    let mut index = Index::default();
    let mut last_seq = 0;

    for (line_no, line) in contents.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<LogEntry>(line) {
            Ok(entry) => {
                last_seq = last_seq.max(entry.seq);
                let (seq, short_id) = (entry.seq, entry.short_id.clone());
                if !index.apply_replayed(entry.into_record()) {
                    warn!(
                        line = line_no + 1,
                        seq,
                        short_id = %short_id,
                        "url already bound to another id, skipping log entry"
                    );
                }
            }
            Err(err) => {
                warn!(
                    line = line_no + 1,
                    content = %String::from_utf8_lossy(line),
                    error = %err,
                    "skipping invalid log entry"
                );
            }
        }
    }

    (index, last_seq)
}

#[async_trait]
impl UrlStore for FileStore {
    async fn save(&self, owner: &OwnerId, proposed_id: &ShortId, url: &str) -> Result<Saved> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.index.existing_id(url) {
            return Ok(Saved::existing(existing.clone()));
        }
        state.index.ensure_id_free(proposed_id)?;

        let record = UrlRecord {
            short_id: proposed_id.clone(),
            original_url: url.to_owned(),
            owner_id: owner.clone(),
            deleted: false,
        };
        let entry = state.entry(&record);
        state.append(&[entry]).await?;

        state
            .index
            .insert(owner, BatchItem::new(proposed_id.clone(), url));
        Ok(Saved::created(proposed_id.clone()))
    }

    async fn save_batch(&self, owner: &OwnerId, items: &[BatchItem]) -> Result<BatchOutcome> {
        let mut state = self.state.write().await;

        let plan = state.index.plan_batch(items)?;
        let mut entries = Vec::with_capacity(plan.to_create.len());
        for item in &plan.to_create {
            let record = UrlRecord {
                short_id: item.short_id.clone(),
                original_url: item.original_url.clone(),
                owner_id: owner.clone(),
                deleted: false,
            };
            entries.push(state.entry(&record));
        }
        state.append(&entries).await?;

        debug!(
            owner = %owner,
            created = plan.to_create.len(),
            existing = plan.outcome.existing.len(),
            "batch appended"
        );
        for item in plan.to_create {
            state.index.insert(owner, item);
        }
        Ok(plan.outcome)
    }

    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.state.read().await.index.get(id))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<BatchItem>> {
        Ok(self.state.read().await.index.user_urls(owner))
    }

    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()> {
        let mut state = self.state.write().await;

        let targets: Vec<UrlRecord> = state
            .index
            .deletable(owner, ids)
            .into_iter()
            .map(|record| UrlRecord {
                deleted: true,
                ..record.clone()
            })
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let entries: Vec<LogEntry> = targets.iter().map(|record| state.entry(record)).collect();
        state.append(&entries).await?;

        for record in &targets {
            state.index.set_deleted(&record.short_id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.path).await.map_err(|e| {
            StorageError::Unavailable(format!("log file {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}
