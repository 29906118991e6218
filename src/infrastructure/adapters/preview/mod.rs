//! Preview Adapters

pub mod mp3;
mod symphonia_preview;
pub mod wav;

pub use symphonia_preview::SymphoniaPreviewSynthesizer;
