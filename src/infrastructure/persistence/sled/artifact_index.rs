//! Sled-based Artifact Index
//!
//! 制品可见性索引：`artifact:<fingerprint>` -> bincode(IndexEntry)
//! 发布与删除都走 compare-and-swap，同一键只有一个规范制品

use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

use crate::application::ports::StoreError;
use crate::domain::track::{ArtifactKey, AudioFormat, TrackMetadata};

/// 索引目录名（位于存储根目录下）
pub const INDEX_DIR_NAME: &str = "index.sled";

const KEY_PREFIX: &str = "artifact:";

/// 索引条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: ArtifactKey,
    /// 分片目录内的文件名
    pub file_name: String,
    pub format: AudioFormat,
    pub size_bytes: u64,
    pub content_md5: String,
    pub metadata: TrackMetadata,
    /// 毫秒时间戳
    pub created_at: i64,
}

/// Sled 制品索引
pub struct ArtifactIndex {
    db: Db,
}

fn index_key(fingerprint: &str) -> String {
    format!("{}{}", KEY_PREFIX, fingerprint)
}

fn db_err(e: sled::Error) -> StoreError {
    StoreError::Index(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<IndexEntry, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl ArtifactIndex {
    /// 打开索引
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref()).map_err(db_err)?;

        tracing::info!(
            db_path = %path.as_ref().display(),
            entries = db.scan_prefix(KEY_PREFIX).count(),
            "ArtifactIndex opened"
        );

        Ok(Self { db })
    }

    /// 查找条目
    pub fn get(&self, fingerprint: &str) -> Result<Option<IndexEntry>, StoreError> {
        match self.db.get(index_key(fingerprint)).map_err(db_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, fingerprint: &str) -> Result<bool, StoreError> {
        self.db.contains_key(index_key(fingerprint)).map_err(db_err)
    }

    /// 发布条目（仅当该键不存在时）
    ///
    /// 返回 `Ok(None)` 表示发布成功，`Ok(Some(existing))` 表示已有规范条目
    pub fn publish(&self, entry: &IndexEntry) -> Result<Option<IndexEntry>, StoreError> {
        let bytes =
            bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let key = index_key(&entry.key.fingerprint());

        match self
            .db
            .compare_and_swap(&key, None as Option<&[u8]>, Some(bytes))
            .map_err(db_err)?
        {
            Ok(()) => {
                self.db.flush().map_err(db_err)?;
                Ok(None)
            }
            Err(conflict) => match conflict.current {
                Some(current) => Ok(Some(decode(&current)?)),
                None => Err(StoreError::Index(format!("CAS conflict without value: {}", key))),
            },
        }
    }

    /// 仅当条目仍指向 `file_name` 时移除，返回是否移除
    pub fn remove_if_file(&self, fingerprint: &str, file_name: &str) -> Result<bool, StoreError> {
        let key = index_key(fingerprint);
        loop {
            let Some(current) = self.db.get(&key).map_err(db_err)? else {
                return Ok(false);
            };
            if decode(&current)?.file_name != file_name {
                return Ok(false);
            }
            match self
                .db
                .compare_and_swap(&key, Some(&current), None as Option<&[u8]>)
                .map_err(db_err)?
            {
                Ok(()) => return Ok(true),
                // 并发修改，重新读取
                Err(_) => continue,
            }
        }
    }

    /// 列出全部条目
    pub fn entries(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(KEY_PREFIX) {
            let (key, value) = item.map_err(db_err)?;
            match decode(&value) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Dropping undecodable index entry"
                    );
                    self.db.remove(&key).map_err(db_err)?;
                }
            }
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.db.scan_prefix(KEY_PREFIX).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::{Provider, SourceId};
    use tempfile::tempdir;

    fn entry(id: &str, file_name: &str) -> IndexEntry {
        IndexEntry {
            key: ArtifactKey::new(Provider::YouTube, SourceId::new(id).unwrap()),
            file_name: file_name.to_string(),
            format: AudioFormat::Mp3,
            size_bytes: 42,
            content_md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            metadata: TrackMetadata::new("Song", "Artist"),
            created_at: 0,
        }
    }

    #[test]
    fn test_first_publisher_wins() {
        let dir = tempdir().unwrap();
        let index = ArtifactIndex::open(dir.path().join(INDEX_DIR_NAME)).unwrap();

        let first = entry("abc", "first.mp3");
        let second = entry("abc", "second.mp3");

        assert_eq!(index.publish(&first).unwrap(), None);
        let existing = index.publish(&second).unwrap().unwrap();
        assert_eq!(existing.file_name, "first.mp3");

        let fp = first.key.fingerprint();
        assert_eq!(index.get(&fp).unwrap().unwrap().file_name, "first.mp3");
    }

    #[test]
    fn test_remove_only_matching_file() {
        let dir = tempdir().unwrap();
        let index = ArtifactIndex::open(dir.path().join(INDEX_DIR_NAME)).unwrap();
        let e = entry("abc", "current.mp3");
        let fp = e.key.fingerprint();
        index.publish(&e).unwrap();

        assert!(!index.remove_if_file(&fp, "stale.mp3").unwrap());
        assert!(index.contains(&fp).unwrap());

        assert!(index.remove_if_file(&fp, "current.mp3").unwrap());
        assert!(!index.contains(&fp).unwrap());
        // 幂等
        assert!(!index.remove_if_file(&fp, "current.mp3").unwrap());
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_DIR_NAME);
        {
            let index = ArtifactIndex::open(&path).unwrap();
            index.publish(&entry("one", "a.mp3")).unwrap();
            index.publish(&entry("two", "b.mp3")).unwrap();
            index.flush().unwrap();
        }
        let index = ArtifactIndex::open(&path).unwrap();
        assert_eq!(index.entries().unwrap().len(), 2);
    }
}
