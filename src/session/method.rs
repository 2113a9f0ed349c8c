//! Control request methods and wire formatting.

use std::fmt;

/// The four control methods of the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the request text for one method.
///
/// Lines are newline-terminated. SETUP carries the transport header with the
/// client's data port; the other methods carry the session id.
pub fn format_request(
    method: Method,
    resource: &str,
    cseq: u32,
    data_port: u16,
    session_id: u32,
) -> String {
    let mut request = format!("{method} {resource} RTSP/1.0\nCSeq: {cseq}\n");
    match method {
        Method::Setup => {
            request.push_str(&format!("Transport: RTP/UDP; client_port={data_port}\n"))
        }
        _ => request.push_str(&format!("Session: {session_id}\n")),
    }
    request
}
