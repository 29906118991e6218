//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod requester_repo;

pub use database::*;
pub use requester_repo::*;
