//! Jitter buffer and paced playback.
//!
//! Completed frames are buffered by timestamp and released to the renderer in
//! strictly increasing timestamp order at a fixed cadence. Playback waits for
//! a pre-roll gate after the first play so startup jitter is absorbed without
//! unbounded delay; pause parks delivery but keeps the buffer intact.

use crate::pipeline::PipelineStage;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::types::CompletedFrame;
use crate::render::Renderer;
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How often the loop wakes while delivery is parked or gated.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Ordered holding area for completed frames awaiting playback.
///
/// `last_played` is the high-water mark: a frame at or below it is dropped on
/// insert, so the renderer can never see a timestamp twice or out of order.
pub struct JitterBuffer {
    frames: BTreeMap<u32, CompletedFrame>,
    last_played: Option<u32>,
}

impl JitterBuffer {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
            last_played: None,
        }
    }

    /// Buffer a frame. Frames at or below the high-water mark are dropped.
    pub fn push(&mut self, frame: CompletedFrame, health: &PipelineHealth) {
        if let Some(last) = self.last_played
            && frame.timestamp <= last
        {
            health.record_frame_suppressed();
            return;
        }
        self.frames.insert(frame.timestamp, frame);
    }

    /// Remove and return the oldest buffered frame, advancing the mark.
    pub fn pop_next(&mut self) -> Option<CompletedFrame> {
        let (timestamp, frame) = self.frames.pop_first()?;
        self.last_played = Some(timestamp);
        Some(frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_played(&self) -> Option<u32> {
        self.last_played
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback pacing knobs.
#[derive(Debug, Clone, Copy)]
pub struct PlayoutConfig {
    /// In-flight reassembly entries that satisfy the pre-roll gate.
    pub preroll_frames: usize,

    /// Longest the pre-roll gate may hold playback.
    pub preroll_timeout: Duration,

    /// Fixed wait between frame deliveries.
    pub frame_interval: Duration,
}

/// Stage wrapper: buffers completed frames and paces them to the renderer.
pub struct PlayoutStage {
    buffer: JitterBuffer,
    config: PlayoutConfig,
    session_id: u32,
    depth: Arc<AtomicUsize>,
    health: Arc<PipelineHealth>,
    cancel: CancellationToken,
    playing: watch::Receiver<bool>,
    renderer: Box<dyn Renderer>,
    input_rx: Option<mpsc::Receiver<CompletedFrame>>,
    preroll_done: bool,
    preroll_deadline: Option<Instant>,
}

impl PlayoutStage {
    pub fn new(
        config: PlayoutConfig,
        session_id: u32,
        depth: Arc<AtomicUsize>,
        health: Arc<PipelineHealth>,
        cancel: CancellationToken,
        playing: watch::Receiver<bool>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            buffer: JitterBuffer::new(),
            config,
            session_id,
            depth,
            health,
            cancel,
            playing,
            renderer,
            input_rx: None,
            preroll_done: false,
            preroll_deadline: None,
        }
    }

    /// Set the completed-frame input channel.
    pub fn set_input(&mut self, rx: mpsc::Receiver<CompletedFrame>) {
        self.input_rx = Some(rx);
    }

    /// Advance the pre-roll gate; returns true once playback may deliver.
    fn preroll_ready(&mut self) -> bool {
        if self.preroll_done {
            return true;
        }

        let deadline = *self.preroll_deadline.get_or_insert_with(|| {
            info!(
                "PlayoutStage: pre-roll, waiting for {} frames (up to {:?})",
                self.config.preroll_frames, self.config.preroll_timeout
            );
            Instant::now() + self.config.preroll_timeout
        });

        if self.depth.load(Ordering::Relaxed) >= self.config.preroll_frames
            || Instant::now() >= deadline
        {
            self.preroll_done = true;
            self.preroll_deadline = None;
            info!("PlayoutStage: pre-roll complete, {} buffered", self.buffer.len());
        }
        self.preroll_done
    }
}

#[async_trait]
impl PipelineStage for PlayoutStage {
    async fn run(&mut self) -> Result<()> {
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No input channel"))?;
        let cancel = self.cancel.clone();
        let mut playing = self.playing.clone();

        info!(
            "PlayoutStage: started (interval {:?})",
            self.config.frame_interval
        );

        // The cadence timer lives outside the loop so frame arrivals cannot
        // reset it; it is only rebuilt when the cadence itself changes.
        let mut cadence = IDLE_POLL;
        let mut ticker = delivery_ticker(cadence);

        loop {
            // The gate only runs while a play is pending on it.
            let delivering = *playing.borrow() && self.preroll_ready();
            let wanted = if delivering {
                self.config.frame_interval
            } else {
                IDLE_POLL
            };
            if wanted != cadence {
                cadence = wanted;
                ticker = delivery_ticker(cadence);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = input_rx.recv() => {
                    match frame {
                        Some(frame) => self.buffer.push(frame, &self.health),
                        None => break,
                    }
                }
                changed = playing.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if delivering && let Some(frame) = self.buffer.pop_next() {
                        self.renderer.render(self.session_id, &frame);
                        self.health.record_frame_played();
                    }
                }
            }
        }

        info!(
            "PlayoutStage: finished ({} frames played, {} left buffered)",
            self.health.frames_played(),
            self.buffer.len()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PlayoutStage"
    }
}

/// A fixed-period tick whose first firing is one full period out. Missed
/// ticks delay rather than burst, keeping the inter-frame wait fixed.
fn delivery_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();
    ticker
}
