//! Control-session state machine.
//!
//! Owns the session fields and drives the setup/play/pause/teardown protocol.
//! Replies are correlated by CSeq and session id; only a 200 status moves the
//! state machine. Accepted transitions are reported as [`SessionEvent`]s so
//! the pipeline owner can arm, start, park, or release the receive path.

use crate::pipeline::health::PipelineHealth;
use crate::session::method::{self, Method};
use crate::session::reply::Reply;
use anyhow::Result;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Control-session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Ready,
    Playing,
}

/// Session fields, mutated only on request send and reply receipt.
#[derive(Debug)]
struct Session {
    state: SessionState,
    cseq: u32,
    /// Server-assigned id; 0 until the first accepted reply fixes it.
    session_id: u32,
    request_sent: Option<Method>,
    teardown_acked: bool,
}

impl Session {
    fn new() -> Self {
        Session {
            state: SessionState::Idle,
            cseq: 0,
            session_id: 0,
            request_sent: None,
            teardown_acked: false,
        }
    }
}

/// Lifecycle notification for one accepted 200 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Setup accepted: open the receive channel and arm the pipeline.
    Ready { session_id: u32 },
    /// Play accepted: start (or resume) paced delivery.
    Playing,
    /// Pause accepted: park delivery, keep buffered state and the data channel.
    Paused,
    /// Teardown acknowledged: release everything.
    TornDown,
}

pub struct SessionController {
    session: Mutex<Session>,
    resource: String,
    data_port: u16,
    request_tx: mpsc::Sender<String>,
    health: Arc<PipelineHealth>,
}

impl SessionController {
    pub fn new(
        resource: String,
        data_port: u16,
        request_tx: mpsc::Sender<String>,
        health: Arc<PipelineHealth>,
    ) -> Self {
        SessionController {
            session: Mutex::new(Session::new()),
            resource,
            data_port,
            request_tx,
            health,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().unwrap().state
    }

    pub fn session_id(&self) -> u32 {
        self.session.lock().unwrap().session_id
    }

    pub fn teardown_acked(&self) -> bool {
        self.session.lock().unwrap().teardown_acked
    }

    /// Request stream setup. No-op unless Idle.
    pub async fn setup(&self) -> Result<()> {
        self.send_request(Method::Setup).await
    }

    /// Request playback. No-op unless Ready.
    pub async fn play(&self) -> Result<()> {
        self.send_request(Method::Play).await
    }

    /// Request a pause. No-op unless Playing.
    pub async fn pause(&self) -> Result<()> {
        self.send_request(Method::Pause).await
    }

    /// Request teardown. No-op in Idle; best-effort otherwise — the session
    /// only leaves its current state once the server acknowledges.
    pub async fn teardown(&self) -> Result<()> {
        self.send_request(Method::Teardown).await
    }

    async fn send_request(&self, requested: Method) -> Result<()> {
        let request = {
            let mut session = self.session.lock().unwrap();
            let allowed = match requested {
                Method::Setup => session.state == SessionState::Idle,
                Method::Play => session.state == SessionState::Ready,
                Method::Pause => session.state == SessionState::Playing,
                Method::Teardown => session.state != SessionState::Idle,
            };
            if !allowed {
                debug!("{requested} ignored in state {:?}", session.state);
                return Ok(());
            }
            session.cseq += 1;
            session.request_sent = Some(requested);
            method::format_request(
                requested,
                &self.resource,
                session.cseq,
                self.data_port,
                session.session_id,
            )
        };

        if self.request_tx.send(request).await.is_err() {
            return Err(crate::error::ClientError::ControlChannelClosed.into());
        }
        Ok(())
    }

    /// Apply one reply.
    ///
    /// Stale, mismatched, malformed, and non-200 replies are dropped without
    /// a transition; they are counted and logged but not surfaced as errors.
    pub fn on_reply(&self, text: &str) -> Option<SessionEvent> {
        let reply = match Reply::parse(text) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{e}");
                self.health.record_malformed_reply();
                return None;
            }
        };

        let mut session = self.session.lock().unwrap();

        if reply.cseq != session.cseq {
            debug!("stale reply: CSeq {} != {}", reply.cseq, session.cseq);
            self.health.record_stale_reply();
            return None;
        }

        // The first matching reply fixes the server-assigned session id.
        if session.session_id == 0 {
            session.session_id = reply.session_id;
        } else if session.session_id != reply.session_id {
            debug!(
                "reply for foreign session {} (ours is {})",
                reply.session_id, session.session_id
            );
            self.health.record_stale_reply();
            return None;
        }

        if reply.status != 200 {
            warn!(
                "server refused {:?} with status {}",
                session.request_sent, reply.status
            );
            self.health.record_refused_request();
            return None;
        }

        match session.request_sent? {
            Method::Setup => {
                session.state = SessionState::Ready;
                Some(SessionEvent::Ready {
                    session_id: session.session_id,
                })
            }
            Method::Play => {
                session.state = SessionState::Playing;
                Some(SessionEvent::Playing)
            }
            Method::Pause => {
                session.state = SessionState::Ready;
                Some(SessionEvent::Paused)
            }
            Method::Teardown => {
                // Session is destroyed on acknowledgment; only the ack flag
                // survives so callers can observe the handshake completed.
                *session = Session::new();
                session.teardown_acked = true;
                Some(SessionEvent::TornDown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (SessionController, mpsc::Receiver<String>) {
        let (request_tx, request_rx) = mpsc::channel(8);
        let health = Arc::new(PipelineHealth::new());
        (
            SessionController::new(String::from("movie.Mjpeg"), 25000, request_tx, health),
            request_rx,
        )
    }

    #[tokio::test]
    async fn setup_reply_moves_to_ready() {
        let (controller, mut request_rx) = controller();

        controller.setup().await.unwrap();
        let request = request_rx.recv().await.unwrap();
        assert!(request.starts_with("SETUP movie.Mjpeg RTSP/1.0\nCSeq: 1\n"));
        assert!(request.contains("client_port=25000"));

        let event = controller.on_reply("RTSP/1.0 200 OK\nCSeq: 1\nSession: 42\n");
        assert_eq!(event, Some(SessionEvent::Ready { session_id: 42 }));
        assert_eq!(controller.state(), SessionState::Ready);
        assert_eq!(controller.session_id(), 42);
    }

    #[tokio::test]
    async fn stale_reply_never_transitions() {
        let (controller, mut request_rx) = controller();
        controller.setup().await.unwrap();
        request_rx.recv().await.unwrap();

        assert_eq!(
            controller.on_reply("RTSP/1.0 200 OK\nCSeq: 7\nSession: 42\n"),
            None
        );
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn foreign_session_ids_are_discarded() {
        let (controller, mut request_rx) = controller();
        controller.setup().await.unwrap();
        request_rx.recv().await.unwrap();
        controller.on_reply("RTSP/1.0 200 OK\nCSeq: 1\nSession: 42\n");

        controller.play().await.unwrap();
        request_rx.recv().await.unwrap();

        // Same CSeq but another server's session id: dropped.
        assert_eq!(
            controller.on_reply("RTSP/1.0 200 OK\nCSeq: 2\nSession: 99\n"),
            None
        );
        assert_eq!(controller.state(), SessionState::Ready);

        // The matching id still goes through.
        assert_eq!(
            controller.on_reply("RTSP/1.0 200 OK\nCSeq: 2\nSession: 42\n"),
            Some(SessionEvent::Playing)
        );
        assert_eq!(controller.state(), SessionState::Playing);
    }

    #[tokio::test]
    async fn non_success_status_is_dropped() {
        let (controller, mut request_rx) = controller();
        controller.setup().await.unwrap();
        request_rx.recv().await.unwrap();

        assert_eq!(
            controller.on_reply("RTSP/1.0 404 Stream Not Found\nCSeq: 1\nSession: 42\n"),
            None
        );
        assert_eq!(controller.state(), SessionState::Idle);
        // The id was still adopted from the correlated reply.
        assert_eq!(controller.session_id(), 42);
    }

    #[tokio::test]
    async fn requests_outside_their_state_are_no_ops() {
        let (controller, mut request_rx) = controller();

        controller.play().await.unwrap();
        controller.pause().await.unwrap();
        controller.teardown().await.unwrap();
        assert!(request_rx.try_recv().is_err());

        controller.setup().await.unwrap();
        request_rx.recv().await.unwrap();
        controller.on_reply("RTSP/1.0 200 OK\nCSeq: 1\nSession: 42\n");

        controller.setup().await.unwrap(); // already Ready
        assert!(request_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_lifecycle_walk() {
        let (controller, mut request_rx) = controller();

        controller.setup().await.unwrap();
        request_rx.recv().await.unwrap();
        controller.on_reply("RTSP/1.0 200 OK\nCSeq: 1\nSession: 42\n");

        controller.play().await.unwrap();
        request_rx.recv().await.unwrap();
        controller.on_reply("RTSP/1.0 200 OK\nCSeq: 2\nSession: 42\n");
        assert_eq!(controller.state(), SessionState::Playing);

        controller.pause().await.unwrap();
        request_rx.recv().await.unwrap();
        assert_eq!(
            controller.on_reply("RTSP/1.0 200 OK\nCSeq: 3\nSession: 42\n"),
            Some(SessionEvent::Paused)
        );
        assert_eq!(controller.state(), SessionState::Ready);

        // Resume, then tear down from Playing.
        controller.play().await.unwrap();
        request_rx.recv().await.unwrap();
        controller.on_reply("RTSP/1.0 200 OK\nCSeq: 4\nSession: 42\n");

        controller.teardown().await.unwrap();
        let request = request_rx.recv().await.unwrap();
        assert!(request.starts_with("TEARDOWN"));
        assert!(!controller.teardown_acked());

        assert_eq!(
            controller.on_reply("RTSP/1.0 200 OK\nCSeq: 5\nSession: 42\n"),
            Some(SessionEvent::TornDown)
        );
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.teardown_acked());
        assert_eq!(controller.session_id(), 0);
    }
}
