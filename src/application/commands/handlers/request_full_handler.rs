//! RequestFull Handler - 凭句柄交付完整音频

use std::sync::Arc;

use crate::application::commands::pipeline_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactLifecyclePort, ContentStorePort};
use crate::domain::retention::RetentionHandle;

/// RequestFull Handler
pub struct RequestFullHandler {
    store: Arc<dyn ContentStorePort>,
    lifecycle: Arc<dyn ArtifactLifecyclePort>,
}

impl RequestFullHandler {
    pub fn new(store: Arc<dyn ContentStorePort>, lifecycle: Arc<dyn ArtifactLifecyclePort>) -> Self {
        Self { store, lifecycle }
    }

    pub async fn handle(&self, cmd: RequestFullCommand) -> Result<FullDelivery, ApplicationError> {
        let handle: RetentionHandle = cmd
            .handle
            .trim()
            .parse()
            .map_err(|_| ApplicationError::HandleNotFound(cmd.handle.clone()))?;

        let consumed = self.lifecycle.consume(&handle).await?;

        let file = match self.store.open(&consumed.artifact).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(release_err) = self.lifecycle.release(&consumed.artifact).await {
                    tracing::warn!(handle = %handle, error = %release_err, "Release after open failure failed");
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            handle = %handle,
            requester_id = %consumed.requester_id,
            key = %consumed.artifact.key,
            size_bytes = consumed.artifact.size_bytes,
            "Delivering full artifact"
        );

        Ok(FullDelivery::new(consumed, file, Arc::clone(&self.lifecycle)))
    }
}
