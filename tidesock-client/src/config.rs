//! Client configuration for Tidesock
//!
//! This module provides configuration options for WebSocket endpoints.

use std::path::PathBuf;
use tidesock_core::error::ConfigError;
use tidesock_core::{Error, Result};

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How many received pings accumulate before the endpoint answers with a
    /// pong. 1 answers every ping.
    pub ping_backlog: u32,
    /// Use non-blocking reads: `read_message` returns immediately when no
    /// data is ready instead of waiting for a frame.
    pub nonblocking: bool,
    /// Override the SNI / certificate validation name. Defaults to the host
    /// parsed from the URL.
    pub server_name: Option<String>,
    /// Additional PEM CA certificates to trust alongside the webpki roots.
    pub ca_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_backlog: 1,
            nonblocking: false,
            server_name: None,
            ca_file: None,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ping_backlog == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "ping_backlog must be at least 1".to_string(),
            )));
        }
        Ok(())
    }

    /// Set the ping backlog threshold
    pub fn ping_backlog(mut self, backlog: u32) -> Self {
        self.ping_backlog = backlog;
        self
    }

    /// Enable or disable non-blocking reads
    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Override the TLS server name
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Trust additional CA certificates from a PEM file
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }
}
