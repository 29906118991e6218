//! Extractor Adapters

mod fake_extractor;
mod ytdlp_extractor;

pub use fake_extractor::FakeExtractor;
pub use ytdlp_extractor::{YtDlpConfig, YtDlpExtractor};
