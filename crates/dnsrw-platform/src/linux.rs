//! Linux TUN device
//!
//! Opens `/dev/net/tun`, attaches an `IFF_TUN | IFF_NO_PI` interface and
//! provisions it through the `ip` utility. The fd is kept non-blocking and
//! reads go through `poll(2)` so the core's cancellable-wait contract
//! holds without thread interruption.

use crate::error::{PlatformError, Result};
use dnsrw_core::config::TunnelConfig;
use dnsrw_core::device::{DeviceProvider, TunnelDevice};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

const TUN_DEVICE_PATH: &str = "/dev/net/tun";
const TUNSETIFF: libc::c_ulong = 0x4004_54CA;
const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

/// Matches the kernel's `struct ifreq` for the TUNSETIFF call
#[repr(C)]
struct IfReq {
    name: [libc::c_char; libc::IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

/// An open TUN interface
pub struct LinuxTun {
    file: File,
    name: String,
}

impl LinuxTun {
    /// Open a TUN device named `name` (truncated to the kernel limit)
    pub fn open(name: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TUN_DEVICE_PATH)
            .map_err(PlatformError::Open)?;

        let mut ifr = IfReq {
            name: [0; libc::IFNAMSIZ],
            flags: IFF_TUN | IFF_NO_PI,
            _pad: [0; 22],
        };
        for (slot, byte) in ifr.name.iter_mut().zip(name.bytes().take(libc::IFNAMSIZ - 1)) {
            *slot = byte as libc::c_char;
        }

        let rc = unsafe { libc::ioctl(file.as_raw_fd(), TUNSETIFF, &mut ifr) };
        if rc < 0 {
            return Err(PlatformError::Ioctl {
                name: "TUNSETIFF",
                source: std::io::Error::last_os_error(),
            });
        }

        // Non-blocking so the poll timeout is the only wait
        let rc = unsafe {
            let flags = libc::fcntl(file.as_raw_fd(), libc::F_GETFL);
            libc::fcntl(file.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK)
        };
        if rc < 0 {
            return Err(PlatformError::Ioctl {
                name: "F_SETFL",
                source: std::io::Error::last_os_error(),
            });
        }

        // The kernel may have picked its own name (e.g. for "tun%d")
        let end = ifr.name.iter().position(|&c| c == 0).unwrap_or(0);
        let actual = ifr.name[..end].iter().map(|&c| c as u8 as char).collect();

        Ok(Self { file, name: actual })
    }

    /// The interface name the kernel assigned
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TunnelDevice for LinuxTun {
    fn read_packet(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> dnsrw_core::Result<Option<usize>> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err.into());
        }
        if ready == 0 {
            return Ok(None);
        }

        match self.file.read(buf) {
            Ok(len) => Ok(Some(len)),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_packet(&mut self, packet: &[u8]) -> dnsrw_core::Result<()> {
        let written = self.file.write(packet)?;
        if written != packet.len() {
            return Err(dnsrw_core::Error::device(format!(
                "short write to {}: {written} of {} bytes",
                self.name,
                packet.len()
            )));
        }
        Ok(())
    }
}

/// Provider opening and provisioning Linux TUN interfaces
#[derive(Default)]
pub struct TunProvider;

impl TunProvider {
    /// Create a provider
    pub fn new() -> Self {
        Self
    }
}

impl DeviceProvider for TunProvider {
    fn acquire(
        &self,
        config: &TunnelConfig,
    ) -> dnsrw_core::Result<Box<dyn TunnelDevice>> {
        let tun = LinuxTun::open(&config.name)?;
        provision(tun.name(), config)?;
        info!(interface = tun.name(), address = %config.address, mtu = config.mtu, "Tunnel device ready");
        Ok(Box::new(tun))
    }
}

/// Assign the address, MTU and catch-all route via `ip`
fn provision(interface: &str, config: &TunnelConfig) -> Result<()> {
    run_ip(
        interface,
        &[
            "addr",
            "add",
            &format!("{}/{}", config.address, config.prefix_len),
            "dev",
            interface,
        ],
    )?;
    run_ip(
        interface,
        &[
            "link",
            "set",
            "dev",
            interface,
            "up",
            "mtu",
            &config.mtu.to_string(),
        ],
    )?;
    run_ip(interface, &["route", "add", "default", "dev", interface])?;

    // Pointing the system resolver at the upstreams is the operator's
    // side of the contract; we only advertise what the config expects.
    warn!(
        servers = ?config.dns_servers,
        "Configure the system resolver to use the upstream DNS servers"
    );

    Ok(())
}

fn run_ip(interface: &str, args: &[&str]) -> Result<()> {
    debug!(?args, "ip");
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|e| PlatformError::Provision {
            interface: interface.to_string(),
            message: format!("failed to run ip: {e}"),
        })?;

    if !output.status.success() {
        return Err(PlatformError::Provision {
            interface: interface.to_string(),
            message: format!(
                "ip {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(())
}
