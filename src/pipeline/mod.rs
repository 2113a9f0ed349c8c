//! Pipeline abstraction for the receive/playback path.
//!
//! The data path is organized into stages that communicate via channels:
//! - Each stage runs in its own async task
//! - Stages implement the `PipelineStage` trait
//! - The receiver coordinator chains stages together and manages lifecycle
//! - Health counters track drops and throughput across the path

pub mod health;
pub mod receiver;
pub mod stage;
pub mod state;
pub mod types;

pub use health::PipelineHealth;
pub use stage::PipelineStage;
pub use state::PipelineState;
pub use types::CompletedFrame;
