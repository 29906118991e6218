//! Persistence Layer - 数据持久化
//!
//! SQLite（请求者统计）和 Sled（制品索引）存储实现

pub mod sled;
pub mod sqlite;

pub use self::sled::ArtifactIndex;
pub use self::sqlite::SqliteRequesterRepository;
