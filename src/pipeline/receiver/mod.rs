//! Receiver-side pipeline: receive → reassembly → playout.

pub mod coordinator;
pub mod playout_stage;
pub mod reassembly_stage;
pub mod receive_stage;

pub use coordinator::ReceiverCoordinator;
