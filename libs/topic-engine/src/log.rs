use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;

use site_api::Record;

use crate::error::LogError;

// ═══════════════════════════════════════════════════════════════
//  DurableLog
// ═══════════════════════════════════════════════════════════════

/// Append-only JSONL файл: одна запись на строку, в порядке append.
///
/// Append берёт lock эксклюзивно, dump разделяемо: dump никогда не видит
/// недописанную строку, два append никогда не перемешиваются.
pub struct DurableLog {
    path: PathBuf,
    lock: RwLock<()>,
}

impl DurableLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist one record at the end of the log.
    ///
    /// On error the record must be treated as not written.
    pub async fn append(&self, record: &Record) -> Result<(), LogError> {
        self.append_then(record, || ()).await
    }

    /// Like [`append`](Self::append), then run `then` before the write lock is
    /// released. Nothing else can append or dump until `then` returns.
    pub async fn append_then<T>(
        &self,
        record: &Record,
        then: impl FnOnce() -> T,
    ) -> Result<T, LogError> {
        let _guard = self.lock.write().await;

        let mut line = serde_json::to_vec(record).map_err(LogError::Encode)?;
        line.push(b'\n');
        self.write_line(&line).await?;

        Ok(then())
    }

    /// Read every record in file order. Creates an empty log if none exists.
    ///
    /// A single undecodable line fails the whole dump, an empty one included.
    pub async fn dump_all(&self) -> Result<Vec<Record>, LogError> {
        let (records, ()) = self.dump_all_then(|| ()).await?;
        Ok(records)
    }

    /// Like [`dump_all`](Self::dump_all), then run `then` while appends are
    /// still held off. Any append ordered after the dump is also ordered after
    /// `then`.
    pub async fn dump_all_then<T>(
        &self,
        then: impl FnOnce() -> T,
    ) -> Result<(Vec<Record>, T), LogError> {
        let _guard = self.lock.read().await;
        let records = self.read_all().await?;
        Ok((records, then()))
    }

    // ── IO ──

    async fn ensure_parent(&self) -> Result<(), LogError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| LogError::Open {
                        path: parent.to_path_buf(),
                        source,
                    })
            }
            _ => Ok(()),
        }
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), LogError> {
        self.ensure_parent().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| self.open_err(source))?;

        let offset = file
            .metadata()
            .await
            .map_err(|source| self.open_err(source))?
            .len();

        // tokio's File only guarantees completion after flush.
        let written = match file.write_all(line).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(source) = written {
            // Cut off whatever part of the line made it to disk.
            if let Err(e) = file.set_len(offset).await {
                tracing::error!(path = %self.path.display(), error = %e, "failed to roll back partial append");
            }
            return Err(LogError::Write {
                path: self.path.clone(),
                source,
            });
        }

        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Record>, LogError> {
        self.ensure_parent().await?;

        // `create` needs write access; nothing is ever written through this handle.
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|source| self.open_err(source))?;

        // Raw bytes: bad UTF-8 is a decode failure, not an IO one.
        let mut lines = BufReader::new(file).split(b'\n');
        let mut records = Vec::new();
        let mut line_no = 0;

        while let Some(line) = lines.next_segment().await.map_err(|source| LogError::Read {
            path: self.path.clone(),
            source,
        })? {
            line_no += 1;
            let record = serde_json::from_slice(&line).map_err(|source| LogError::Decode {
                path: self.path.clone(),
                line: line_no,
                source,
            })?;
            records.push(record);
        }

        Ok(records)
    }

    fn open_err(&self, source: std::io::Error) -> LogError {
        LogError::Open {
            path: self.path.clone(),
            source,
        }
    }
}
