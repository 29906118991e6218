//! File Content Store - 内容寻址的文件系统存储
//!
//! 实现 ContentStorePort trait
//!
//! 目录结构: `<root>/<fp[0..2]>/<fp>-<write id>.<ext>`，索引位于 `<root>/index.sled`

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::application::ports::{ArtifactRef, ContentStorePort, StoreError, StoreStats};
use crate::domain::track::{ArtifactKey, AudioFormat, TrackMetadata};
use crate::infrastructure::persistence::sled::{ArtifactIndex, IndexEntry, INDEX_DIR_NAME};

const STAGING_SUFFIX: &str = ".partial";

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

/// 文件系统内容存储
pub struct FileContentStore {
    /// 存储根目录
    root: PathBuf,
    index: ArtifactIndex,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl FileContentStore {
    /// 打开存储，并对磁盘与索引做一次对账
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(io_err)?;

        let index = ArtifactIndex::open(root.join(INDEX_DIR_NAME))?;
        let store = Self {
            root,
            index,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        };
        store.reconcile().await?;

        tracing::info!(
            root = %store.root.display(),
            entries = store.index.len(),
            "FileContentStore initialized"
        );
        Ok(store)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 获取存储根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, fingerprint: &str) -> PathBuf {
        self.root.join(&fingerprint[..2])
    }

    fn to_ref(&self, entry: IndexEntry) -> ArtifactRef {
        let fingerprint = entry.key.fingerprint();
        let created_at = Utc
            .timestamp_millis_opt(entry.created_at)
            .single()
            .unwrap_or_else(Utc::now);
        ArtifactRef {
            path: self.shard_dir(&fingerprint).join(&entry.file_name),
            key: entry.key,
            format: entry.format,
            size_bytes: entry.size_bytes,
            content_md5: entry.content_md5,
            metadata: entry.metadata,
            created_at,
        }
    }

    /// 清理残留的临时文件、无索引文件和指向缺失文件的索引条目
    async fn reconcile(&self) -> Result<(), StoreError> {
        let mut removed_files = 0usize;
        let mut dropped_entries = 0usize;

        let mut shards = fs::read_dir(&self.root).await.map_err(io_err)?;
        while let Some(shard) = shards.next_entry().await.map_err(io_err)? {
            let name = shard.file_name().to_string_lossy().to_string();
            let is_shard = name.len() == 2 && name.chars().all(|c| c.is_ascii_hexdigit());
            if !is_shard || !shard.file_type().await.map_err(io_err)?.is_dir() {
                continue;
            }

            let mut files = fs::read_dir(shard.path()).await.map_err(io_err)?;
            while let Some(file) = files.next_entry().await.map_err(io_err)? {
                let file_name = file.file_name().to_string_lossy().to_string();
                let keep = !file_name.ends_with(STAGING_SUFFIX)
                    && match file_name.split('-').next() {
                        Some(fp) => self
                            .index
                            .get(fp)?
                            .map_or(false, |entry| entry.file_name == file_name),
                        None => false,
                    };
                if !keep {
                    tracing::debug!(path = %file.path().display(), "Removing orphan file");
                    fs::remove_file(file.path()).await.map_err(io_err)?;
                    removed_files += 1;
                }
            }
        }

        for entry in self.index.entries()? {
            let fingerprint = entry.key.fingerprint();
            let path = self.shard_dir(&fingerprint).join(&entry.file_name);
            if !fs::try_exists(&path).await.map_err(io_err)? {
                self.index.remove_if_file(&fingerprint, &entry.file_name)?;
                dropped_entries += 1;
            }
        }

        if removed_files > 0 || dropped_entries > 0 {
            tracing::info!(
                removed_files = removed_files,
                dropped_entries = dropped_entries,
                "Content store reconciled"
            );
        }
        Ok(())
    }

    /// 将源文件移入临时名、落盘并计算 md5，返回 (大小, md5)
    async fn stage(&self, source: &Path, staging: &Path) -> Result<(u64, String), StoreError> {
        let expected = fs::metadata(source).await.map_err(io_err)?.len();
        if expected == 0 {
            return Err(StoreError::Io(format!("empty source file: {}", source.display())));
        }

        // 跨文件系统时 rename 会失败，退回到复制
        if fs::rename(source, staging).await.is_err() {
            fs::copy(source, staging).await.map_err(io_err)?;
        }

        let mut file = fs::File::open(staging).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        let mut context = md5::Context::new();
        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
            total += n as u64;
        }

        if total != expected {
            return Err(StoreError::Io(format!(
                "size mismatch after staging: expected {}, got {}",
                expected, total
            )));
        }
        Ok((total, format!("{:x}", context.compute())))
    }
}

#[async_trait]
impl ContentStorePort for FileContentStore {
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        self.index.contains(&key.fingerprint())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Option<ArtifactRef>, StoreError> {
        let fingerprint = key.fingerprint();
        match self.index.get(&fingerprint)? {
            Some(entry) => {
                let artifact = self.to_ref(entry);
                if !fs::try_exists(&artifact.path).await.map_err(io_err)? {
                    tracing::warn!(key = %key, path = %artifact.path.display(), "Indexed file missing");
                    let file_name = artifact
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    self.index.remove_if_file(&fingerprint, &file_name)?;
                    self.miss_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(artifact))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(
        &self,
        key: &ArtifactKey,
        source: &Path,
        format: AudioFormat,
        metadata: TrackMetadata,
    ) -> Result<ArtifactRef, StoreError> {
        let fingerprint = key.fingerprint();

        if let Some(existing) = self.index.get(&fingerprint)? {
            tracing::debug!(key = %key, "Artifact already stored, discarding new file");
            return Ok(self.to_ref(existing));
        }

        let shard = self.shard_dir(&fingerprint);
        fs::create_dir_all(&shard).await.map_err(io_err)?;

        let write_id = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}-{}.{}", fingerprint, &write_id[..12], format.extension());
        let staging = shard.join(format!("{}{}", file_name, STAGING_SUFFIX));
        let final_path = shard.join(&file_name);

        let (size_bytes, content_md5) = match self.stage(source, &staging).await {
            Ok(staged) => staged,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&staging, &final_path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_err(e));
        }

        let entry = IndexEntry {
            key: key.clone(),
            file_name,
            format,
            size_bytes,
            content_md5,
            metadata,
            created_at: Utc::now().timestamp_millis(),
        };

        match self.index.publish(&entry) {
            Ok(None) => {
                tracing::debug!(
                    key = %key,
                    path = %final_path.display(),
                    size_bytes = size_bytes,
                    "Artifact published"
                );
                Ok(self.to_ref(entry))
            }
            Ok(Some(existing)) => {
                tracing::debug!(key = %key, "Lost publication race, keeping existing artifact");
                let _ = fs::remove_file(&final_path).await;
                Ok(self.to_ref(existing))
            }
            Err(e) => {
                let _ = fs::remove_file(&final_path).await;
                Err(e)
            }
        }
    }

    async fn open(&self, artifact: &ArtifactRef) -> Result<fs::File, StoreError> {
        fs::File::open(&artifact.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(artifact.key.to_string()),
            _ => io_err(e),
        })
    }

    async fn read(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, StoreError> {
        fs::read(&artifact.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(artifact.key.to_string()),
            _ => io_err(e),
        })
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        let fingerprint = artifact.key.fingerprint();
        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let unindexed = self.index.remove_if_file(&fingerprint, &file_name)?;

        match fs::remove_file(&artifact.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        tracing::debug!(key = %artifact.key, unindexed = unindexed, "Artifact deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ArtifactRef>, StoreError> {
        Ok(self
            .index
            .entries()?
            .into_iter()
            .map(|entry| self.to_ref(entry))
            .collect())
    }

    async fn stats(&self) -> StoreStats {
        let entries = self.index.entries().unwrap_or_default();
        StoreStats {
            total_entries: entries.len(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}
