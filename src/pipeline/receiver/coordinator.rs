//! Receiver pipeline coordinator.
//!
//! Owns the stage tasks behind one control session and moves them through
//! the pipeline lifecycle: arm on setup success, start on play success,
//! suspend on pause success, close on teardown acknowledgment. The data
//! channel stays open across suspend; only close releases it.

use crate::pipeline::health::PipelineHealth;
use crate::pipeline::receiver::playout_stage::{PlayoutConfig, PlayoutStage};
use crate::pipeline::receiver::reassembly_stage::ReassemblyStage;
use crate::pipeline::receiver::receive_stage::ReceiveStage;
use crate::pipeline::stage::spawn_stage;
use crate::pipeline::state::PipelineState;
use crate::render::Renderer;
use anyhow::{Result, bail};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Knobs for the stages the coordinator spawns.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverConfig {
    /// Receive timeout on the data channel.
    pub recv_timeout: Duration,

    /// How long a reassembly entry may wait for its marker.
    pub eviction_timeout: Duration,

    pub playout: PlayoutConfig,
}

pub struct ReceiverCoordinator {
    state: PipelineState,
    config: ReceiverConfig,
    health: Arc<PipelineHealth>,
    depth: Arc<AtomicUsize>,
    cancel: Option<CancellationToken>,
    playing_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl ReceiverCoordinator {
    pub fn new(config: ReceiverConfig, health: Arc<PipelineHealth>) -> Self {
        Self {
            state: PipelineState::Idle,
            config,
            health,
            depth: Arc::new(AtomicUsize::new(0)),
            cancel: None,
            playing_tx: None,
            handles: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, target: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            bail!("invalid pipeline transition {} -> {}", self.state, target);
        }
        if self.state != target {
            info!("pipeline: {} -> {}", self.state, target);
        }
        self.state = target;
        Ok(())
    }

    /// Spawn the stage chain over an open data channel. The session id is the
    /// one adopted by the controller; the renderer receives it with each frame.
    pub fn arm(
        &mut self,
        socket: UdpSocket,
        session_id: u32,
        renderer: Box<dyn Renderer>,
    ) -> Result<()> {
        self.transition(PipelineState::Armed)?;

        self.depth.store(0, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (playing_tx, playing_rx) = watch::channel(false);

        let mut receive = ReceiveStage::new(
            socket,
            self.config.recv_timeout,
            cancel.clone(),
            self.health.clone(),
        );
        let mut reassembly = ReassemblyStage::new(
            self.config.eviction_timeout,
            self.depth.clone(),
            self.health.clone(),
        );
        reassembly.set_input(receive.take_output());

        let mut playout = PlayoutStage::new(
            self.config.playout,
            session_id,
            self.depth.clone(),
            self.health.clone(),
            cancel.clone(),
            playing_rx,
            renderer,
        );
        playout.set_input(reassembly.take_output());

        self.handles = vec![
            spawn_stage(receive),
            spawn_stage(reassembly),
            spawn_stage(playout),
        ];
        self.cancel = Some(cancel);
        self.playing_tx = Some(playing_tx);
        Ok(())
    }

    /// Begin (or resume) paced delivery.
    pub fn start(&mut self) -> Result<()> {
        self.transition(PipelineState::Playing)?;
        if let Some(tx) = &self.playing_tx {
            let _ = tx.send(true);
        }
        Ok(())
    }

    /// Park delivery; buffered frames and the data channel are kept.
    pub fn suspend(&mut self) -> Result<()> {
        self.transition(PipelineState::Paused)?;
        if let Some(tx) = &self.playing_tx {
            let _ = tx.send(false);
        }
        Ok(())
    }

    /// Tear the stage chain down and release the data channel.
    pub async fn close(&mut self) -> Result<()> {
        self.transition(PipelineState::Closed)?;

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.playing_tx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("pipeline: closed ({})", self.health.summary());
        Ok(())
    }
}
