use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use relaygate_core::error::{RelayError, Result};
use relaygate_core::protocol::DecoderLimits;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub decoder: DecoderSection,

    #[serde(default)]
    pub offline: OfflineSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::UnsupportedVersion);
        }
        self.gateway.validate()?;
        self.decoder.validate()?;
        self.offline.validate()?;
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            decoder: DecoderSection::default(),
            offline: OfflineSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// Raw TCP listener.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// HTTP listener (WebSocket endpoint and ops routes).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,

    /// Forced-close deadline for connections that never send ONLINE.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Per-connection outbound frame queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Wait for outbound queue space before falling back offline; 0 waits forever.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            http_listen: default_http_listen(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=300_000).contains(&self.handshake_timeout_ms) {
            return Err(RelayError::Config(
                "gateway.handshake_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(RelayError::Config("gateway.outbound_queue must be at least 1".into()));
        }
        let (tcp, http) = (self.listen_addr()?, self.http_addr()?);
        if tcp == http {
            return Err(RelayError::Config(format!(
                "gateway.listen and gateway.http_listen both bind {tcp}"
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("gateway.listen", &self.listen)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        parse_addr("gateway.http_listen", &self.http_listen)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_ms > 0).then(|| Duration::from_millis(self.send_timeout_ms))
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|_| RelayError::Config(format!("{field} must be host:port, got {value:?}")))
}

fn default_listen() -> String {
    "0.0.0.0:1888".into()
}
fn default_http_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_outbound_queue() -> usize {
    1024
}
fn default_send_timeout_ms() -> u64 {
    1500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for DecoderSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl DecoderSection {
    pub fn validate(&self) -> Result<()> {
        if !(64..=16 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(RelayError::Config(
                "decoder.max_frame_bytes must be between 64 and 16777216".into(),
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> DecoderLimits {
        DecoderLimits {
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

/// What `enqueue` does when a bounded pipeline is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for the consumer to make room.
    #[default]
    Block,
    /// Fail with `PipelineFull`.
    Reject,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OfflineSection {
    /// `None` grows without bound.
    #[serde(default)]
    pub capacity: Option<usize>,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl OfflineSection {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(RelayError::Config(
                "offline.capacity must be at least 1 (omit it for unbounded)".into(),
            ));
        }
        Ok(())
    }
}
