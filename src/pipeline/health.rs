//! Health counters for the receiver pipeline and control session.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared across the receive, reassembly, and playout paths.
///
/// All fields use atomic operations for thread-safe access; everything that
/// is dropped instead of delivered shows up here rather than as an error.
pub struct PipelineHealth {
    /// Datagrams successfully decoded into fragments
    pub packets_received: AtomicU64,

    /// Payload bytes carried by decoded fragments
    pub bytes_received: AtomicU64,

    /// Datagrams dropped because they were shorter than the header
    pub malformed_fragments: AtomicU64,

    /// Fragments dropped because their frame was already finalized
    pub late_fragments: AtomicU64,

    /// Reassembly entries evicted because their marker never arrived
    pub evicted_entries: AtomicU64,

    /// Frames completed by the reassembler
    pub frames_completed: AtomicU64,

    /// Frames delivered to the renderer
    pub frames_played: AtomicU64,

    /// Frames discarded because their timestamp was already played
    pub frames_suppressed: AtomicU64,

    /// Replies dropped for a CSeq or session-id mismatch
    pub stale_replies: AtomicU64,

    /// Replies dropped because they did not parse
    pub malformed_replies: AtomicU64,

    /// Requests the server answered with a non-200 status
    pub refused_requests: AtomicU64,
}

impl PipelineHealth {
    pub fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            malformed_fragments: AtomicU64::new(0),
            late_fragments: AtomicU64::new(0),
            evicted_entries: AtomicU64::new(0),
            frames_completed: AtomicU64::new(0),
            frames_played: AtomicU64::new(0),
            frames_suppressed: AtomicU64::new(0),
            stale_replies: AtomicU64::new(0),
            malformed_replies: AtomicU64::new(0),
            refused_requests: AtomicU64::new(0),
        }
    }

    pub fn record_packet(&self, payload_len: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_malformed_fragment(&self) {
        self.malformed_fragments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late_fragment(&self) {
        self.late_fragments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: u64) {
        self.evicted_entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_frame_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_played(&self) {
        self.frames_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_suppressed(&self) {
        self.frames_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_reply(&self) {
        self.stale_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_reply(&self) {
        self.malformed_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refused_request(&self) {
        self.refused_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn malformed_fragments(&self) -> u64 {
        self.malformed_fragments.load(Ordering::Relaxed)
    }

    pub fn late_fragments(&self) -> u64 {
        self.late_fragments.load(Ordering::Relaxed)
    }

    pub fn evicted_entries(&self) -> u64 {
        self.evicted_entries.load(Ordering::Relaxed)
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed.load(Ordering::Relaxed)
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    pub fn frames_suppressed(&self) -> u64 {
        self.frames_suppressed.load(Ordering::Relaxed)
    }

    pub fn stale_replies(&self) -> u64 {
        self.stale_replies.load(Ordering::Relaxed)
    }

    pub fn malformed_replies(&self) -> u64 {
        self.malformed_replies.load(Ordering::Relaxed)
    }

    pub fn refused_requests(&self) -> u64 {
        self.refused_requests.load(Ordering::Relaxed)
    }

    /// Get a snapshot of the counters.
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            packets_received: self.packets_received(),
            bytes_received: self.bytes_received(),
            malformed_fragments: self.malformed_fragments(),
            late_fragments: self.late_fragments(),
            evicted_entries: self.evicted_entries(),
            frames_completed: self.frames_completed(),
            frames_played: self.frames_played(),
            frames_suppressed: self.frames_suppressed(),
            stale_replies: self.stale_replies(),
            malformed_replies: self.malformed_replies(),
            refused_requests: self.refused_requests(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health counters.
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub malformed_fragments: u64,
    pub late_fragments: u64,
    pub evicted_entries: u64,
    pub frames_completed: u64,
    pub frames_played: u64,
    pub frames_suppressed: u64,
    pub stale_replies: u64,
    pub malformed_replies: u64,
    pub refused_requests: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets / {} bytes ({} malformed, {} late, {} evicted), {} frames completed, {} played ({} suppressed), {} stale replies, {} malformed replies, {} refused requests",
            self.packets_received,
            self.bytes_received,
            self.malformed_fragments,
            self.late_fragments,
            self.evicted_entries,
            self.frames_completed,
            self.frames_played,
            self.frames_suppressed,
            self.stale_replies,
            self.malformed_replies,
            self.refused_requests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let health = PipelineHealth::new();

        health.record_packet(1000);
        health.record_packet(2000);
        health.record_malformed_fragment();
        health.record_frame_completed();
        health.record_frame_played();
        health.record_stale_reply();

        assert_eq!(health.packets_received(), 2);
        assert_eq!(health.bytes_received(), 3000);
        assert_eq!(health.malformed_fragments(), 1);
        assert_eq!(health.frames_completed(), 1);
        assert_eq!(health.frames_played(), 1);
        assert_eq!(health.stale_replies(), 1);
    }

    #[test]
    fn summary_reflects_counters() {
        let health = PipelineHealth::new();
        health.record_packet(64);
        health.record_evicted(3);

        let summary = health.summary();
        assert_eq!(summary.packets_received, 1);
        assert_eq!(summary.evicted_entries, 3);
        assert!(summary.to_string().contains("1 packets"));
    }
}
