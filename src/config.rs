//! Client configuration surface.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Options recognized by the client.
///
/// Durations are carried as milliseconds so they can come straight from a
/// JSON config file; the accessors below convert them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address for the control channel.
    pub server_addr: String,
    /// Server control port.
    pub control_port: u16,
    /// Local port for the data channel; 0 picks an ephemeral port.
    pub data_port: u16,
    /// Resource (stream) name requested at setup.
    pub resource: String,
    /// Pre-roll: in-flight frame threshold that lets playback start early.
    pub preroll_frames: usize,
    /// Pre-roll: upper bound on buffering time before playback starts.
    pub preroll_timeout_ms: u64,
    /// Fixed inter-frame playback interval; approximates the source frame
    /// rate, not derived from the stream.
    pub frame_interval_ms: u64,
    /// Data-channel receive timeout; bounds how quickly cancellation is seen.
    pub recv_timeout_ms: u64,
    /// How long an incomplete frame may wait for its marker before eviction.
    pub eviction_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_addr: String::from("127.0.0.1"),
            control_port: 8554,
            data_port: 25000,
            resource: String::from("movie.Mjpeg"),
            preroll_frames: 10,
            preroll_timeout_ms: 5000,
            frame_interval_ms: 50,
            recv_timeout_ms: 500,
            eviction_timeout_ms: 3000,
        }
    }
}

impl ClientConfig {
    /// Load options from a JSON file; anything absent falls back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn preroll_timeout(&self) -> Duration {
        Duration::from_millis(self.preroll_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn eviction_timeout(&self) -> Duration {
        Duration::from_millis(self.eviction_timeout_ms)
    }
}

/// Returns the name as specified in Cargo.toml
pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.control_port, 8554);
        assert_eq!(config.preroll_frames, 10);
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"resource": "trailer.Mjpeg", "preroll_timeout_ms": 2000}"#)
                .unwrap();
        assert_eq!(config.resource, "trailer.Mjpeg");
        assert_eq!(config.preroll_timeout(), Duration::from_secs(2));
        assert_eq!(config.data_port, 25000);
    }
}
