//! Device configuration as consumed by the controller
//!
//! The host application owns the configuration form; this is just the plain
//! data it hands over, plus the rules for turning it into a socket address.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::ConfigError;
use crate::model::Model;

/// Connection settings for one processor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// IPv4 address of the processor
    pub host: Option<String>,
    /// TCP port, defaults per model family when unset
    pub port: Option<u16>,
    /// Processor model
    pub model: Model,
    /// Log every command and status line at info level
    pub verbose: bool,
}

impl DeviceConfig {
    pub fn new(host: &str, model: Model) -> Self {
        DeviceConfig {
            host: Some(host.to_string()),
            port: None,
            model,
            verbose: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Port to connect to: the configured one, or the model's default
    pub fn resolved_port(&self) -> Result<u16, ConfigError> {
        match self.port {
            Some(0) => Err(ConfigError::InvalidPort),
            Some(port) => Ok(port),
            None => Ok(self.model.default_port()),
        }
    }

    /// Resolve host and port into the address to connect to
    pub fn address(&self) -> Result<SocketAddrV4, ConfigError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;
        let ip: Ipv4Addr = host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(host.to_string()))?;
        Ok(SocketAddrV4::new(ip, self.resolved_port()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_by_model() {
        let config = DeviceConfig::new("10.0.0.5", Model::Cp950);
        assert_eq!(
            config.address(),
            Ok(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 61408))
        );

        let config = DeviceConfig::new("10.0.0.5", Model::Cp650);
        assert_eq!(config.address().unwrap().port(), 61412);
    }

    #[test]
    fn test_explicit_port() {
        let config = DeviceConfig::new("192.168.0.1", Model::Cp750).with_port(10001);
        assert_eq!(config.address().unwrap().port(), 10001);
    }

    #[test]
    fn test_missing_host() {
        let config = DeviceConfig::default();
        assert_eq!(config.address(), Err(ConfigError::MissingHost));

        let config = DeviceConfig::new("  ", Model::Cp650);
        assert_eq!(config.address(), Err(ConfigError::MissingHost));
    }

    #[test]
    fn test_invalid_host_and_port() {
        let config = DeviceConfig::new("cinema-1.local", Model::Cp650);
        assert_eq!(
            config.address(),
            Err(ConfigError::InvalidHost("cinema-1.local".into()))
        );

        let config = DeviceConfig::new("10.0.0.5", Model::Cp650).with_port(0);
        assert_eq!(config.address(), Err(ConfigError::InvalidPort));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{"host": "10.0.0.5", "model": "cp850"}"#).unwrap();
        assert_eq!(config.model, Model::Cp850);
        assert_eq!(config.port, None);
        assert!(!config.verbose);
    }
}
