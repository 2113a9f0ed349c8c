//! Receiver pipeline lifecycle states.

/// Lifecycle of the receive/playback machinery behind one control session.
///
/// `Armed` is entered on setup success: the data channel is open and the
/// reassembler accepts fragments, but nothing is delivered until `Playing`.
/// Transitions are validated so a mis-sequenced controller event cannot put
/// the pipeline in an impossible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No data channel yet.
    Idle,

    /// Stages are running; delivery has never started.
    Armed,

    /// Paced delivery to the renderer is active.
    Playing,

    /// Delivery is parked; fragments are still accepted and buffered.
    Paused,

    /// Data channel released; the pipeline cannot be restarted.
    Closed,
}

impl PipelineState {
    /// Check if this state transition is valid.
    pub fn can_transition_to(self, target: PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            (Idle, Armed) => true,
            (Armed, Playing) => true,
            (Playing, Paused) => true,
            (Paused, Playing) => true,
            (Armed | Playing | Paused, Closed) => true,

            // A fresh session may re-arm after the previous one closed.
            (Closed, Armed) => true,

            // Self-transitions
            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Armed => "Armed",
            PipelineState::Playing => "Playing",
            PipelineState::Paused => "Paused",
            PipelineState::Closed => "Closed",
        }
    }

    /// Check if the pipeline holds an open data channel.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelineState::Armed | PipelineState::Playing | PipelineState::Paused
        )
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PipelineState::Playing)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
