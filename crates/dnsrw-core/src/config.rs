//! Configuration management for dnsrw
//!
//! Provides a strongly-typed configuration system with TOML support.
//! Every section has sensible defaults so an empty file is a valid config.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tunnel device settings
    pub tunnel: TunnelConfig,

    /// Rule source settings
    pub rules: RulesConfig,

    /// Packet handling policies
    pub policy: PolicyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tunnel: TunnelConfig::default(),
            rules: RulesConfig::default(),
            policy: PolicyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // 576 is the minimum IPv4 reassembly buffer any host must accept
        if self.tunnel.mtu < 576 {
            return Err(Error::config_value(
                "tunnel.mtu",
                format!("{} is below the IPv4 minimum of 576", self.tunnel.mtu),
            ));
        }

        if self.tunnel.prefix_len > 32 {
            return Err(Error::config_value(
                "tunnel.prefix_len",
                "must be between 0 and 32",
            ));
        }

        if self.tunnel.dns_servers.is_empty() {
            return Err(Error::config_value(
                "tunnel.dns_servers",
                "at least one upstream DNS server is required",
            ));
        }

        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Tunnel device settings
///
/// These are handed verbatim to the platform device provider; the core
/// itself only reads and writes whole IP datagrams through the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Device name (platform may ignore or decorate it)
    pub name: String,
    /// Local address of the virtual interface
    pub address: Ipv4Addr,
    /// Network prefix length for the local address
    pub prefix_len: u8,
    /// MTU of the virtual interface
    pub mtu: u16,
    /// Upstream DNS servers advertised to the system
    pub dns_servers: Vec<Ipv4Addr>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            name: "dnsrw0".to_string(),
            address: Ipv4Addr::new(10, 0, 0, 2),
            prefix_len: 24,
            mtu: 1400,
            dns_servers: vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)],
        }
    }
}

/// Rule source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Path to the rules file (`<address> <domain>` lines)
    pub file: Option<String>,
}

/// Packet handling policies
///
/// Both knobs exist because the observed behaviors genuinely differ between
/// deployments; neither is an accident of implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// What to do with non-IPv4 packets read from the tunnel
    pub non_ipv4: NonIpv4Policy,
    /// What to do with AAAA/HTTPS queries for a domain that has a rule
    pub blocked_qtypes: BlockedQtypePolicy,
}

/// Disposition of non-IPv4 packets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonIpv4Policy {
    /// Forward unchanged through the tunnel egress
    #[default]
    Forward,
    /// Silently drop
    Drop,
}

/// Disposition of AAAA/HTTPS queries matching a rewrite rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockedQtypePolicy {
    /// Answer with NXDOMAIN so clients settle on the spoofed A record
    #[default]
    Nxdomain,
    /// Forward to the upstream resolver unchanged
    Forward,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path (None = stdout only)
    pub file: Option<String>,
    /// Enable JSON format logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tunnel.address, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(config.tunnel.mtu, 1400);
        assert_eq!(config.tunnel.dns_servers.len(), 2);
        assert_eq!(config.policy.non_ipv4, NonIpv4Policy::Forward);
        assert_eq!(config.policy.blocked_qtypes, BlockedQtypePolicy::Nxdomain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(parsed.tunnel.address, config.tunnel.address);
        assert_eq!(parsed.tunnel.mtu, config.tunnel.mtu);
        assert_eq!(parsed.policy.non_ipv4, config.policy.non_ipv4);
    }

    #[test]
    fn test_toml_parse_minimal() {
        let toml_content = r#"
[tunnel]
mtu = 1500

[policy]
non_ipv4 = "drop"

[rules]
file = "rules.txt"
"#;
        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.tunnel.mtu, 1500);
        assert_eq!(config.policy.non_ipv4, NonIpv4Policy::Drop);
        assert_eq!(config.rules.file.as_deref(), Some("rules.txt"));
        // Untouched sections keep their defaults
        assert_eq!(config.tunnel.address, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_toml_parse_invalid() {
        let invalid_toml = "this is not [valid toml";
        assert!(Config::from_toml(invalid_toml).is_err());
    }

    #[test]
    fn test_validation_rejects_tiny_mtu() {
        let mut config = Config::default();
        config.tunnel.mtu = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_prefix() {
        let mut config = Config::default();
        config.tunnel.prefix_len = 33;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_requires_dns_servers() {
        let mut config = Config::default();
        config.tunnel.dns_servers.clear();
        assert!(config.validate().is_err());
    }
}
