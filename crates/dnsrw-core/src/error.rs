//! Error types for dnsrw-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for dnsrw-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Packet is too small to process
    #[error("Packet too small: expected at least {expected} bytes, got {actual}")]
    PacketTooSmall {
        /// Minimum expected size
        expected: usize,
        /// Actual packet size
        actual: usize,
    },

    /// DNS message parsing failed
    #[error("DNS parse error: {message}")]
    DnsParse {
        /// Detailed error message
        message: String,
    },

    /// A rule line or rule set could not be used
    #[error("Invalid rule '{rule}': {message}")]
    InvalidRule {
        /// The offending rule text
        rule: String,
        /// Error message
        message: String,
    },

    /// Rule source failed to deliver rules
    #[error("Rule source error: {0}")]
    RuleSource(String),

    /// Tunnel device could not be acquired or driven
    #[error("Tunnel device error: {0}")]
    Device(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a DNS parse error
    pub fn dns_parse(message: impl Into<String>) -> Self {
        Self::DnsParse {
            message: message.into(),
        }
    }

    /// Create an invalid rule error
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create a device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }

    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::dns_parse("no question record");
        assert!(err.to_string().contains("no question record"));

        let err = Error::PacketTooSmall {
            expected: 20,
            actual: 3,
        };
        assert!(err.to_string().contains("20"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_invalid_rule_display() {
        let err = Error::invalid_rule("999.1.1.1 foo.com", "not an IPv4 address");
        assert!(err.to_string().contains("999.1.1.1 foo.com"));
        assert!(err.to_string().contains("not an IPv4 address"));
    }
}
