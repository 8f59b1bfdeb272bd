//! Demo configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the demo can start with zero
//! configuration for local experiments.

use std::path::PathBuf;

use libp2p::Multiaddr;

use causerie_shared::constants::DEFAULT_QUIC_PORT;

/// Demo configuration.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// QUIC port to listen on.
    /// Env: `CAUSERIE_PORT`
    /// Default: `4001`
    pub listen_port: u16,

    /// Comma-separated multiaddrs of peers to dial on startup.
    /// Env: `CAUSERIE_PEERS`
    /// Default: empty.
    pub peers: Vec<Multiaddr>,

    /// Explicit database path; defaults to the platform data directory.
    /// Env: `CAUSERIE_DB`
    pub db_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_QUIC_PORT,
            peers: Vec::new(),
            db_path: None,
        }
    }
}

impl DemoConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("CAUSERIE_PORT") {
            match port.parse::<u16>() {
                Ok(p) => config.listen_port = p,
                Err(_) => tracing::warn!(value = %port, "Invalid CAUSERIE_PORT, using default"),
            }
        }

        if let Ok(peers) = std::env::var("CAUSERIE_PEERS") {
            for part in peers.split(',').filter(|p| !p.trim().is_empty()) {
                match part.trim().parse::<Multiaddr>() {
                    Ok(addr) => config.peers.push(addr),
                    Err(e) => {
                        tracing::warn!(value = %part, error = %e, "Skipping invalid peer multiaddr")
                    }
                }
            }
        }

        if let Ok(path) = std::env::var("CAUSERIE_DB") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's
        // EnvFilter, so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DemoConfig::default();
        assert_eq!(config.listen_port, DEFAULT_QUIC_PORT);
        assert!(config.peers.is_empty());
        assert!(config.db_path.is_none());
    }
}
