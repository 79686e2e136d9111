use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often a blocked read wakes up to look at the interrupt flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of waiting for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// This many bytes were stored in the buffer.
    Data(usize),
    /// Nothing arrived within the configured timeout.
    TimedOut(Duration),
    /// The operator pressed Ctrl-C while waiting.
    Interrupted,
}

/// Datagram link to the device gateway.
///
/// The harness only talks to this trait, so tests can swap the socket for an
/// in-memory recorder.
pub trait Transport {
    /// Sends one datagram and returns the number of bytes written.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Waits for one datagram and stores it in `buf`.
    fn recv(&mut self, buf: &mut [u8]) -> Result<Received>;

    /// Human-readable peer address, e.g. `127.0.0.1:4242`.
    fn peer(&self) -> String;
}

/// [`Transport`] over a UDP socket bound to an ephemeral local port.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    recv_timeout: Option<Duration>,
    interrupted: Arc<AtomicBool>,
}

impl UdpTransport {
    /// `recv_timeout` of `None` waits until a datagram arrives or the interrupt flag is raised.
    pub fn new(peer: SocketAddr, recv_timeout: Option<Duration>) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).context("failed to bind UDP socket")?;

        let poll = match recv_timeout {
            Some(limit) if !limit.is_zero() => limit.min(POLL_INTERVAL),
            _ => POLL_INTERVAL,
        };
        socket
            .set_read_timeout(Some(poll))
            .context("failed to set read timeout")?;

        Ok(Self {
            socket,
            peer,
            recv_timeout,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that makes a pending [`Transport::recv`] return [`Received::Interrupted`].
    ///
    /// The binary hands this to the Ctrl-C handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.socket
            .send_to(data, self.peer)
            .with_context(|| format!("failed to send to UDP {}", self.peer))
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Received> {
        let started = Instant::now();
        loop {
            // Datagrams longer than `buf` are truncated by the OS.
            match self.socket.recv_from(buf) {
                Ok((n, _from)) => return Ok(Received::Data(n)),
                Err(e) if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
                Err(e) => return Err(e).context("failed to read response"),
            }

            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Ok(Received::Interrupted);
            }
            if let Some(limit) = self.recv_timeout {
                if started.elapsed() >= limit {
                    return Ok(Received::TimedOut(limit));
                }
            }
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
