//! dnsrw Platform Abstraction Layer
//!
//! Implements the core's tunnel device capability interface.
//!
//! ## Supported Platforms
//!
//! - **Linux**: TUN device via `/dev/net/tun`
//! - Everything else: acquisition fails with a clear error

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::TunProvider;

use dnsrw_core::device::DeviceProvider;

/// The device provider for the current platform
pub fn default_provider() -> Box<dyn DeviceProvider> {
    #[cfg(target_os = "linux")]
    {
        Box::new(TunProvider::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(unsupported::UnsupportedProvider)
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use dnsrw_core::config::TunnelConfig;
    use dnsrw_core::device::{DeviceProvider, TunnelDevice};
    use dnsrw_core::Error;

    pub struct UnsupportedProvider;

    impl DeviceProvider for UnsupportedProvider {
        fn acquire(
            &self,
            _config: &TunnelConfig,
        ) -> dnsrw_core::Result<Box<dyn TunnelDevice>> {
            Err(Error::device(
                "tunnel devices are not supported on this platform",
            ))
        }
    }
}
