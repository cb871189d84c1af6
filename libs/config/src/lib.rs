// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! The boundary configuration struct `HostBridge::start` takes. The agent
//! never loads an INI file or any other config source itself; that belongs
//! to whatever out-of-scope process embeds it (SPEC_FULL §4.10).

use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target_port must be non-zero")]
    ZeroPort,
}

/// `original_tls_size` must match the target image's static TLS block size
/// exactly: it determines `OFF_STATE`/`OFF_ORIG` via
/// [`tls::TlsLayout::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub target_address: Ipv4Addr,
    pub target_port: u16,
    pub original_tls_size: u16,
}

impl AgentConfig {
    pub fn new(target_address: Ipv4Addr, target_port: u16, original_tls_size: u16) -> Result<Self, ConfigError> {
        if target_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        Ok(Self {
            target_address,
            target_port,
            original_tls_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_port() {
        assert!(matches!(
            AgentConfig::new(Ipv4Addr::LOCALHOST, 0, 0),
            Err(ConfigError::ZeroPort)
        ));
    }

    #[test]
    fn accepts_valid_config() {
        let cfg = AgentConfig::new(Ipv4Addr::new(10, 0, 0, 1), 9000, 0x1000).unwrap();
        assert_eq!(cfg.target_port, 9000);
    }
}
