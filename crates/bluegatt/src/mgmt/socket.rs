//! Management socket implementation
//!
//! A non-blocking raw socket bound to the kernel's Bluetooth management
//! channel. The channel is message-oriented: each read yields exactly one
//! complete frame, so no reassembly is needed. Requires CAP_NET_ADMIN.

use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use log::warn;

use crate::error::{Error, Result};
use crate::mgmt::constants::*;
use crate::mgmt::packet::ControlFrame;

const AF_BLUETOOTH: i32 = 31;

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

/// The control-channel contract, also implemented by test doubles
pub trait ControlChannel {
    /// Write exactly one frame atomically
    fn send(&mut self, frame: &ControlFrame) -> Result<()>;

    /// Wait up to `timeout` for readability
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Drain all complete frames currently available
    fn receive(&mut self) -> Result<Vec<ControlFrame>>;

    /// Idempotent; safe from the shutdown path
    fn close(&mut self);
}

/// A raw management-channel socket
#[derive(Debug)]
pub struct MgmtSocket {
    fd: RawFd,
}

impl MgmtSocket {
    /// Opens the management channel. The channel is bound to
    /// `HCI_DEV_NONE`; individual controllers are addressed per-frame by
    /// their controller index.
    pub fn open() -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                BTPROTO_HCI,
            )
        };

        if fd < 0 {
            return Err(Error::Socket(std::io::Error::last_os_error()));
        }

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: HCI_DEV_NONE,
            hci_channel: HCI_CHANNEL_CONTROL,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            unsafe { libc::close(fd) };
            return Err(Error::Bind(std::io::Error::last_os_error()));
        }

        Ok(MgmtSocket { fd })
    }

    fn is_open(&self) -> bool {
        self.fd >= 0
    }
}

impl ControlChannel for MgmtSocket {
    fn send(&mut self, frame: &ControlFrame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::Closed);
        }

        let bytes = frame.encode();
        let written =
            unsafe { libc::write(self.fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if written < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        if written as usize != bytes.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "partial management frame write",
            )));
        }
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        if !self.is_open() {
            return Err(Error::Closed);
        }

        let mut fds = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let result = unsafe { libc::poll(&mut fds, 1, timeout.as_millis() as libc::c_int) };
        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(Error::Io(err));
        }

        Ok(result > 0 && (fds.revents & libc::POLLIN) != 0)
    }

    fn receive(&mut self) -> Result<Vec<ControlFrame>> {
        if !self.is_open() {
            return Err(Error::Closed);
        }

        let mut frames = Vec::new();
        let mut buffer = [0u8; MGMT_MAX_FRAME_LEN];

        loop {
            let bytes_read = unsafe {
                libc::read(
                    self.fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                )
            };

            if bytes_read < 0 {
                let err = std::io::Error::last_os_error();
                match err.kind() {
                    std::io::ErrorKind::WouldBlock => break,
                    std::io::ErrorKind::Interrupted => continue,
                    _ => return Err(Error::Io(err)),
                }
            }
            if bytes_read == 0 {
                return Err(Error::Closed);
            }

            // Malformed datagrams are dropped, not fatal
            match ControlFrame::parse(&buffer[..bytes_read as usize]) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("dropping malformed management frame: {}", e),
            }
        }

        Ok(frames)
    }

    fn close(&mut self) {
        if self.is_open() {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }
}

impl AsRawFd for MgmtSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for MgmtSocket {
    fn drop(&mut self) {
        self.close();
    }
}
