//! Pipeline Context - 请求状态机

mod state;

pub use state::{PipelineState, PipelineTracker, StateTransitionError};
