//! Client front door: control channel, reply listener, and pipeline wiring.
//!
//! `StreamClient::connect` opens the control channel, binds the data channel,
//! and spawns the three long-lived tasks of a session: the request writer,
//! the reply listener feeding the controller, and the event loop that maps
//! accepted replies onto the receiver pipeline. Lifecycle commands go through
//! the controller; the caller observes completion via `wait_teardown`.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net;
use crate::pipeline::health::{HealthSummary, PipelineHealth};
use crate::pipeline::receiver::ReceiverCoordinator;
use crate::pipeline::receiver::coordinator::ReceiverConfig;
use crate::pipeline::receiver::playout_stage::PlayoutConfig;
use crate::render::Renderer;
use crate::session::{SessionController, SessionEvent, SessionState};
use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UdpSocket;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Every reply is exactly this many newline-terminated lines.
const REPLY_LINES: usize = 3;

pub struct StreamClient {
    controller: Arc<SessionController>,
    health: Arc<PipelineHealth>,
    io_tasks: Vec<JoinHandle<()>>,
    event_loop: JoinHandle<()>,
}

impl StreamClient {
    /// Open the control and data channels and spawn the session tasks.
    ///
    /// The data channel is bound here so a bind failure surfaces before any
    /// request is sent; the kernel buffers early fragments until the pipeline
    /// is armed. The renderer is handed to the pipeline on setup success.
    pub async fn connect(
        config: &ClientConfig,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self, ClientError> {
        let stream = net::connect_control(&config.server_addr, config.control_port).await?;
        let socket = net::bind_data(config.data_port).await?;
        let data_port = socket
            .local_addr()
            .map_err(|source| ClientError::BindFailure {
                port: config.data_port,
                source,
            })?
            .port();

        let (read_half, write_half) = stream.into_split();
        let (request_tx, request_rx) = mpsc::channel::<String>(8);
        let health = Arc::new(PipelineHealth::new());
        let controller = Arc::new(SessionController::new(
            config.resource.clone(),
            data_port,
            request_tx,
            health.clone(),
        ));

        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(8);
        let io_tasks = vec![
            tokio::spawn(write_requests(write_half, request_rx)),
            tokio::spawn(listen_replies(read_half, controller.clone(), event_tx)),
        ];

        let coordinator = ReceiverCoordinator::new(
            ReceiverConfig {
                recv_timeout: config.recv_timeout(),
                eviction_timeout: config.eviction_timeout(),
                playout: PlayoutConfig {
                    preroll_frames: config.preroll_frames,
                    preroll_timeout: config.preroll_timeout(),
                    frame_interval: config.frame_interval(),
                },
            },
            health.clone(),
        );
        let event_loop = tokio::spawn(run_session_events(event_rx, coordinator, socket, renderer));

        Ok(Self {
            controller,
            health,
            io_tasks,
            event_loop,
        })
    }

    pub async fn setup(&self) -> Result<()> {
        self.controller.setup().await
    }

    pub async fn play(&self) -> Result<()> {
        self.controller.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.controller.pause().await
    }

    pub async fn teardown(&self) -> Result<()> {
        self.controller.teardown().await
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn session_id(&self) -> u32 {
        self.controller.session_id()
    }

    pub fn summary(&self) -> HealthSummary {
        self.health.summary()
    }

    /// Wait until the teardown acknowledgment has closed the pipeline, then
    /// stop the control-channel tasks.
    pub async fn wait_teardown(self) {
        let _ = self.event_loop.await;
        for task in self.io_tasks {
            task.abort();
        }
        info!("session finished ({})", self.health.summary());
    }
}

async fn write_requests(mut write_half: OwnedWriteHalf, mut request_rx: mpsc::Receiver<String>) {
    while let Some(request) = request_rx.recv().await {
        if let Err(e) = write_half.write_all(request.as_bytes()).await {
            error!("control channel write failed: {e}");
            break;
        }
    }
}

async fn listen_replies(
    read_half: OwnedReadHalf,
    controller: Arc<SessionController>,
    event_tx: mpsc::Sender<SessionEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();

    'replies: loop {
        let mut reply = String::new();
        for _ in 0..REPLY_LINES {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    reply.push_str(&line);
                    reply.push('\n');
                }
                Ok(None) => break 'replies,
                Err(e) => {
                    error!("control channel read failed: {e}");
                    break 'replies;
                }
            }
        }

        if let Some(event) = controller.on_reply(&reply)
            && event_tx.send(event).await.is_err()
        {
            break;
        }
    }
    info!("reply listener finished");
}

/// Map accepted replies onto the receiver pipeline. Runs until teardown is
/// acknowledged or the listener goes away.
async fn run_session_events(
    mut event_rx: mpsc::Receiver<SessionEvent>,
    mut coordinator: ReceiverCoordinator,
    socket: UdpSocket,
    renderer: Box<dyn Renderer>,
) {
    let mut socket = Some(socket);
    let mut renderer = Some(renderer);

    while let Some(event) = event_rx.recv().await {
        let applied = match event {
            SessionEvent::Ready { session_id } => match (socket.take(), renderer.take()) {
                (Some(socket), Some(renderer)) => coordinator.arm(socket, session_id, renderer),
                _ => {
                    warn!("setup acknowledged but the data channel is already armed");
                    Ok(())
                }
            },
            SessionEvent::Playing => coordinator.start(),
            SessionEvent::Paused => coordinator.suspend(),
            SessionEvent::TornDown => {
                if let Err(e) = coordinator.close().await {
                    error!("pipeline close failed: {e:#}");
                }
                break;
            }
        };
        if let Err(e) = applied {
            warn!("dropping session event {event:?}: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::CompletedFrame;
    use crate::rtp::RtpPacket;
    use bytes::Bytes;
    use std::net::IpAddr;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Clone)]
    struct RecordingRenderer {
        seen: Arc<Mutex<Vec<(u32, u32, Bytes)>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, session_id: u32, frame: &CompletedFrame) {
            self.seen
                .lock()
                .unwrap()
                .push((session_id, frame.timestamp, frame.data.clone()));
        }
    }

    /// Minimal server: acknowledges every request with status 200 and session
    /// id 42, and pushes one fragmented frame at the client on PLAY.
    async fn scripted_server(listener: TcpListener) {
        let (stream, peer) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut client_port = 0u16;

        loop {
            let request_line = match lines.next_line().await.unwrap() {
                Some(line) => line,
                None => break,
            };
            let cseq_line = lines.next_line().await.unwrap().unwrap();
            let extra_line = lines.next_line().await.unwrap().unwrap();

            let method = request_line.split(' ').next().unwrap().to_string();
            let cseq: u32 = cseq_line.trim_start_matches("CSeq: ").trim().parse().unwrap();
            if method == "SETUP" {
                client_port = extra_line.rsplit('=').next().unwrap().trim().parse().unwrap();
            }

            write_half
                .write_all(format!("RTSP/1.0 200 OK\nCSeq: {cseq}\nSession: 42\n").as_bytes())
                .await
                .unwrap();

            if method == "PLAY" {
                send_frame(peer.ip(), client_port, 100).await;
            }
            if method == "TEARDOWN" {
                break;
            }
        }
    }

    async fn send_frame(ip: IpAddr, port: u16, timestamp: u32) {
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for (seq, marker, payload) in [(1u16, false, &b"left-"[..]), (2, true, &b"right"[..])] {
            let packet = RtpPacket {
                version: crate::rtp::VERSION,
                payload_type: 26,
                marker,
                sequence_number: seq,
                timestamp,
                ssrc: 0,
                payload: Bytes::copy_from_slice(payload),
            };
            sender.send_to(&packet.encode(), (ip, port)).await.unwrap();
        }
    }

    async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "timed out: {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn full_session_against_a_scripted_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server_addr: String::from("127.0.0.1"),
            control_port: listener.local_addr().unwrap().port(),
            data_port: 0,
            preroll_frames: 1,
            preroll_timeout_ms: 50,
            frame_interval_ms: 10,
            recv_timeout_ms: 50,
            ..ClientConfig::default()
        };
        let server = tokio::spawn(scripted_server(listener));

        let renderer = RecordingRenderer {
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let client = StreamClient::connect(&config, Box::new(renderer.clone()))
            .await
            .unwrap();

        client.setup().await.unwrap();
        wait_for("setup acknowledgment", || client.state() == SessionState::Ready).await;
        assert_eq!(client.session_id(), 42);

        client.play().await.unwrap();
        wait_for("a rendered frame", || !renderer.seen.lock().unwrap().is_empty()).await;
        let (session_id, timestamp, data) = renderer.seen.lock().unwrap()[0].clone();
        assert_eq!(session_id, 42);
        assert_eq!(timestamp, 100);
        assert_eq!(&data[..], b"left-right");

        client.pause().await.unwrap();
        wait_for("pause acknowledgment", || client.state() == SessionState::Ready).await;

        client.teardown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(3), client.wait_teardown())
            .await
            .expect("teardown never completed");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_fails_without_a_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server_addr: String::from("127.0.0.1"),
            control_port: listener.local_addr().unwrap().port(),
            ..ClientConfig::default()
        };
        drop(listener);

        let err = match StreamClient::connect(&config, Box::new(crate::render::LogRenderer)).await {
            Ok(_) => panic!("connect succeeded with nothing listening"),
            Err(err) => err,
        };
        assert!(matches!(err, ClientError::ConnectionFailure { .. }));
    }
}
