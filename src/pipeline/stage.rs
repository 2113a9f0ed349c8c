//! Pipeline stage trait.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for pipeline stages that process media data.
///
/// Each stage runs in its own task and talks to its neighbours over channels;
/// a stage finishes when its input closes or cancellation is observed.
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage until its input closes or the session is cancelled.
    async fn run(&mut self) -> Result<()>;

    /// Get the name of this stage for logging.
    fn name(&self) -> &'static str;
}

/// Spawn a stage onto the runtime, logging its failure if it returns one.
pub fn spawn_stage<S: PipelineStage + 'static>(mut stage: S) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = stage.run().await {
            log::error!("{}: {e:#}", stage.name());
        }
    })
}
