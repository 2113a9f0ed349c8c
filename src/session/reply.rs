//! Control reply parsing.

use crate::error::ClientError;

/// A parsed control reply: status line, `CSeq: <n>`, `Session: <id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub cseq: u32,
    pub session_id: u32,
}

impl Reply {
    /// Parse the three newline-terminated reply lines.
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        let mut lines = text.lines();

        let status = lines
            .next()
            .filter(|line| line.starts_with("RTSP/1.0 "))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| malformed(text, "bad status line"))?;

        let cseq = header_value(lines.next(), "CSeq:")
            .ok_or_else(|| malformed(text, "bad CSeq header"))?;
        let session_id = header_value(lines.next(), "Session:")
            .ok_or_else(|| malformed(text, "bad Session header"))?;

        Ok(Reply {
            status,
            cseq,
            session_id,
        })
    }
}

fn header_value(line: Option<&str>, name: &str) -> Option<u32> {
    line?.strip_prefix(name)?.trim().parse().ok()
}

fn malformed(text: &str, reason: &str) -> ClientError {
    ClientError::MalformedReply(format!("{reason} in {text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_reply() {
        let reply = Reply::parse("RTSP/1.0 200 OK\nCSeq: 1\nSession: 42\n").unwrap();
        assert_eq!(
            reply,
            Reply {
                status: 200,
                cseq: 1,
                session_id: 42
            }
        );
    }

    #[test]
    fn reason_phrase_is_ignored() {
        let reply = Reply::parse("RTSP/1.0 404 Stream Not Found\nCSeq: 3\nSession: 0\n").unwrap();
        assert_eq!(reply.status, 404);
        assert_eq!(reply.session_id, 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Reply::parse("ICY 200 OK\nCSeq: 1\nSession: 42\n").is_err());
        assert!(Reply::parse("RTSP/1.0 200 OK\nCSeq: 1\n").is_err());
        assert!(Reply::parse("RTSP/1.0 200 OK\nCSeq: one\nSession: 42\n").is_err());
        assert!(Reply::parse("").is_err());
    }
}
