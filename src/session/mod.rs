//! Control-session protocol.
//!
//! Request formatting, reply parsing, and the four-state session controller
//! that drives setup/play/pause/teardown against the media server.

pub mod controller;
pub mod method;
pub mod reply;

pub use controller::{SessionController, SessionEvent, SessionState};
pub use method::Method;
pub use reply::Reply;
