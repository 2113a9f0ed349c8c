//! Receive stage: reads datagrams off the data channel and decodes fragments.
//!
//! Receives under a short timeout so cancellation is observed within one
//! timeout interval even if the server goes quiet. Malformed datagrams are
//! dropped and counted; any other socket failure ends the loop.

use crate::pipeline::PipelineStage;
use crate::pipeline::health::PipelineHealth;
use crate::rtp::RtpPacket;
use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Largest datagram the data channel will accept.
const MAX_DATAGRAM: usize = 65536;

pub struct ReceiveStage {
    socket: UdpSocket,
    recv_timeout: Duration,
    cancel: CancellationToken,
    health: Arc<PipelineHealth>,
    output_tx: Option<mpsc::Sender<RtpPacket>>,
}

impl ReceiveStage {
    pub fn new(
        socket: UdpSocket,
        recv_timeout: Duration,
        cancel: CancellationToken,
        health: Arc<PipelineHealth>,
    ) -> Self {
        Self {
            socket,
            recv_timeout,
            cancel,
            health,
            output_tx: None,
        }
    }

    /// Get the fragment output channel.
    pub fn take_output(&mut self) -> mpsc::Receiver<RtpPacket> {
        let (tx, rx) = mpsc::channel::<RtpPacket>(128);
        self.output_tx = Some(tx);
        rx
    }
}

#[async_trait]
impl PipelineStage for ReceiveStage {
    async fn run(&mut self) -> Result<()> {
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("No output channel"))?;
        let cancel = self.cancel.clone();

        info!("ReceiveStage: started on {}", self.socket.local_addr()?);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = tokio::time::timeout(self.recv_timeout, self.socket.recv_from(&mut buf)) => r,
            };

            let len = match received {
                // Receive timeout: expected control flow, re-check cancellation.
                Err(_) => continue,
                Ok(Ok((len, _addr))) => len,
                Ok(Err(e)) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    error!("ReceiveStage: data channel error: {e}");
                    return Err(e.into());
                }
            };

            match RtpPacket::decode(&buf[..len]) {
                Ok(packet) => {
                    self.health.record_packet(packet.payload.len());
                    if output_tx.send(packet).await.is_err() {
                        info!("ReceiveStage: output channel closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!("ReceiveStage: dropping datagram: {e}");
                    self.health.record_malformed_fragment();
                }
            }
        }

        info!(
            "ReceiveStage: finished ({} packets received)",
            self.health.packets_received()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReceiveStage"
    }
}
