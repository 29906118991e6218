//! Query Handlers 实现

mod lyrics_handlers;
mod requester_handlers;

pub use lyrics_handlers::*;
pub use requester_handlers::*;
