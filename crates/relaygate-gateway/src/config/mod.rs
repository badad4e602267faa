//! relaygate config loading.
//!
//! YAML is parsed strictly (unknown keys fail) and then validated section by
//! section. Every failure is a `RelayError::Config` naming the source and,
//! for YAML errors, the offending line.

pub mod schema;

use std::fs;
use std::path::Path;

use relaygate_core::error::{RelayError, Result};

pub use schema::{DecoderSection, GatewayConfig, GatewaySection, OfflineSection, OverflowPolicy};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("cannot read {}: {e}", path.display())))?;
    load_from_str(&s).map_err(|e| match e {
        RelayError::Config(msg) => RelayError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    if s.trim().is_empty() {
        return Err(RelayError::Config("empty config, expected at least `version: 1`".into()));
    }
    let cfg: GatewayConfig = serde_yaml::from_str(s).map_err(|e| {
        let msg = match e.location() {
            Some(at) => format!("invalid yaml at line {}: {e}", at.line()),
            None => format!("invalid yaml: {e}"),
        };
        RelayError::Config(msg)
    })?;
    cfg.validate()?;
    tracing::debug!(
        listen = %cfg.gateway.listen,
        http_listen = %cfg.gateway.http_listen,
        max_frame_bytes = cfg.decoder.max_frame_bytes,
        offline_capacity = ?cfg.offline.capacity,
        "config loaded"
    );
    Ok(cfg)
}
