//! 请求流水线状态
//!
//! Idle → Resolving → {Cached | Downloading} → PreviewReady → Delivered，终态 Failed

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Resolving,
    Downloading,
    Cached,
    PreviewReady,
    Delivered,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Resolving => "resolving",
            PipelineState::Downloading => "downloading",
            PipelineState::Cached => "cached",
            PipelineState::PreviewReady => "preview_ready",
            PipelineState::Delivered => "delivered",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Delivered | PipelineState::Failed)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, Resolving) => true,
            (Resolving, Cached | Downloading) => true,
            (Downloading, Cached) => true,
            (Cached, PreviewReady) => true,
            (PreviewReady, Delivered) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pipeline transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// 单个请求的状态跟踪，记录经过的状态
#[derive(Debug, Clone)]
pub struct PipelineTracker {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl PipelineTracker {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// 推进状态；重复进入当前状态视为无操作
    pub fn advance(&mut self, next: PipelineState) -> Result<(), StateTransitionError> {
        if self.current == next {
            return Ok(());
        }
        if !self.current.can_transition_to(next) {
            return Err(StateTransitionError {
                from: self.current,
                to: next,
            });
        }
        tracing::trace!(from = %self.current, to = %next, "Pipeline state changed");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for PipelineTracker {
    fn default() -> Self {
        Self::new()
    }
}
