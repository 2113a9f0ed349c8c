//! Fragment reassembly stage.
//!
//! Groups fragments by timestamp and finalizes a frame the instant the
//! end-of-frame marker is observed, concatenating whatever fragments are
//! present in ascending sequence-number order. Anything arriving for an
//! already finalized timestamp is dropped, and entries whose marker never
//! shows up are evicted after a timeout so severe loss cannot grow the
//! pending map without bound.

use crate::pipeline::PipelineStage;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::types::CompletedFrame;
use crate::rtp::RtpPacket;
use anyhow::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// How many finalized timestamps to remember for late-fragment detection.
const COMPLETED_MEMORY: usize = 64;

/// How often abandoned entries are swept.
const EVICT_INTERVAL: Duration = Duration::from_millis(500);

struct Entry {
    fragments: BTreeMap<u16, Bytes>,
    first_seen: Instant,
}

/// Reassembles frames from fragments, one entry per in-flight timestamp.
///
/// An entry exists only while its frame is incomplete; it is deleted the
/// instant the marker is seen, even if earlier sequence numbers are missing.
/// Finalizing on the marker bounds memory and playback delay at the cost of
/// the occasional incomplete frame under severe reordering.
pub struct FrameReassembler {
    pending: HashMap<u32, Entry>,
    completed: VecDeque<u32>,
    depth: Arc<AtomicUsize>,
    eviction_timeout: Duration,
}

impl FrameReassembler {
    pub fn new(eviction_timeout: Duration, depth: Arc<AtomicUsize>) -> Self {
        Self {
            pending: HashMap::new(),
            completed: VecDeque::with_capacity(COMPLETED_MEMORY),
            depth,
            eviction_timeout,
        }
    }

    /// Insert one fragment; returns the finalized frame when this fragment
    /// carries the marker. Duplicate sequence numbers overwrite, so
    /// redelivery is idempotent.
    pub fn push(&mut self, packet: RtpPacket, health: &PipelineHealth) -> Option<CompletedFrame> {
        let timestamp = packet.timestamp;

        if self.completed.contains(&timestamp) {
            // The frame was already finalized; late stragglers are dropped.
            health.record_late_fragment();
            return None;
        }

        let entry = self.pending.entry(timestamp).or_insert_with(|| Entry {
            fragments: BTreeMap::new(),
            first_seen: Instant::now(),
        });
        entry.fragments.insert(packet.sequence_number, packet.payload);

        if !packet.marker {
            self.publish_depth();
            return None;
        }

        let entry = self.pending.remove(&timestamp)?;
        self.remember_completed(timestamp);
        self.publish_depth();

        let mut data = BytesMut::new();
        for payload in entry.fragments.values() {
            data.extend_from_slice(payload);
        }
        health.record_frame_completed();

        Some(CompletedFrame {
            timestamp,
            data: data.freeze(),
        })
    }

    /// Drop entries whose marker never arrived within the eviction timeout.
    pub fn evict_stale(&mut self, now: Instant, health: &PipelineHealth) {
        let before = self.pending.len();
        let timeout = self.eviction_timeout;
        self.pending
            .retain(|_, entry| now.duration_since(entry.first_seen) < timeout);

        let evicted = before - self.pending.len();
        if evicted > 0 {
            warn!("evicted {evicted} reassembly entries without a marker");
            health.record_evicted(evicted as u64);
            self.publish_depth();
        }
    }

    /// Number of frames currently being reassembled.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn publish_depth(&self) {
        self.depth.store(self.pending.len(), Ordering::Relaxed);
    }

    fn remember_completed(&mut self, timestamp: u32) {
        if self.completed.len() == COMPLETED_MEMORY {
            self.completed.pop_front();
        }
        self.completed.push_back(timestamp);
    }
}

/// Stage wrapper: fragments in, completed frames out.
pub struct ReassemblyStage {
    reassembler: FrameReassembler,
    health: Arc<PipelineHealth>,
    input_rx: Option<mpsc::Receiver<RtpPacket>>,
    output_tx: Option<mpsc::Sender<CompletedFrame>>,
}

impl ReassemblyStage {
    pub fn new(
        eviction_timeout: Duration,
        depth: Arc<AtomicUsize>,
        health: Arc<PipelineHealth>,
    ) -> Self {
        Self {
            reassembler: FrameReassembler::new(eviction_timeout, depth),
            health,
            input_rx: None,
            output_tx: None,
        }
    }

    /// Set the fragment input channel.
    pub fn set_input(&mut self, rx: mpsc::Receiver<RtpPacket>) {
        self.input_rx = Some(rx);
    }

    /// Get the completed-frame output channel.
    pub fn take_output(&mut self) -> mpsc::Receiver<CompletedFrame> {
        let (tx, rx) = mpsc::channel::<CompletedFrame>(64);
        self.output_tx = Some(tx);
        rx
    }
}

#[async_trait]
impl PipelineStage for ReassemblyStage {
    async fn run(&mut self) -> Result<()> {
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No input channel"))?;
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No output channel"))?;

        info!("ReassemblyStage: started");
        let mut last_stats = Instant::now();

        // The sweep tick lives outside the loop so a steady fragment stream
        // cannot keep resetting it.
        let mut evict_tick = tokio::time::interval(EVICT_INTERVAL);
        evict_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                packet = input_rx.recv() => {
                    match packet {
                        Some(packet) => {
                            if let Some(frame) = self.reassembler.push(packet, &self.health)
                                && output_tx.send(frame).await.is_err()
                            {
                                info!("ReassemblyStage: output channel closed");
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = evict_tick.tick() => {
                    self.reassembler.evict_stale(Instant::now(), &self.health);
                }
            }

            if last_stats.elapsed().as_secs() >= 30 {
                info!(
                    "ReassemblyStage: {} ({} in flight)",
                    self.health.summary(),
                    self.reassembler.in_flight()
                );
                last_stats = Instant::now();
            }
        }

        info!(
            "ReassemblyStage: finished ({} frames completed)",
            self.health.frames_completed()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReassemblyStage"
    }
}
