//! Storage Adapters

mod file_content_store;

pub use file_content_store::FileContentStore;
