//! Error types for dnsrw-platform

use thiserror::Error;

/// Platform adapter errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The tunnel device node could not be opened
    #[error("Failed to open tunnel device: {0}")]
    Open(std::io::Error),

    /// A device ioctl failed
    #[error("Device ioctl '{name}' failed: {source}")]
    Ioctl {
        /// The ioctl that failed
        name: &'static str,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Interface provisioning (address, MTU, route) failed
    #[error("Failed to provision interface '{interface}': {message}")]
    Provision {
        /// Interface name
        interface: String,
        /// What went wrong
        message: String,
    },

    /// I/O error on the open device
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, PlatformError>;

impl From<PlatformError> for dnsrw_core::Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Io(e) => dnsrw_core::Error::Io(e),
            other => dnsrw_core::Error::Device(other.to_string()),
        }
    }
}
