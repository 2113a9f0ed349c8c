//! Renderer seam.
//!
//! Frame decoding and display live outside the client core; the playback
//! scheduler hands each completed frame to a [`Renderer`] and moves on.

use crate::pipeline::types::CompletedFrame;
use log::info;

/// Collaborator that accepts completed frames for display.
pub trait Renderer: Send {
    /// Accept one frame payload. `session_id` is an opaque association with
    /// the control session that produced the frame. No return value: display
    /// problems are the renderer's business, not the scheduler's.
    fn render(&mut self, session_id: u32, frame: &CompletedFrame);
}

/// Renderer used by the CLI binary: logs frame metadata instead of drawing.
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&mut self, session_id: u32, frame: &CompletedFrame) {
        info!(
            "frame ts={} ({} bytes) session={}",
            frame.timestamp,
            frame.size(),
            session_id
        );
    }
}
