//! # Datagram Transport
//!
//! The send side the driver hands finished payloads to. Connectionless and
//! best-effort: no acknowledgement, ordering, or retry.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send to {dest} failed: {source}")]
    Send {
        dest: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("short datagram to {dest}: {sent} of {expected} bytes")]
    Truncated {
        dest: SocketAddr,
        sent: usize,
        expected: usize,
    },
}

/// Something that can fire a single datagram at a destination.
pub trait Transport {
    /// Sends `payload` as one datagram. Returns the number of bytes written.
    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<usize, TransportError> {
        (**self).send(dest, payload)
    }
}

/// UDP transport over an ephemeral local port.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds an ephemeral socket of the same address family as `dest`.
    pub fn bind_for(dest: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = match dest {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        Ok(UdpTransport { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<usize, TransportError> {
        let sent = self
            .socket
            .send_to(payload, dest)
            .map_err(|source| TransportError::Send { dest, source })?;
        if sent != payload.len() {
            return Err(TransportError::Truncated {
                dest,
                sent,
                expected: payload.len(),
            });
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn loopback_datagram_arrives_intact() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let dest = rx.local_addr().unwrap();

        let mut tx = UdpTransport::bind_for(dest).unwrap();
        let payload = b"\x43\x02\xff";
        assert_eq!(tx.send(dest, payload).unwrap(), 3);

        let mut buf = [0u8; 64];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], payload);
    }

    #[test]
    fn bind_for_matches_family() {
        let tx = UdpTransport::bind_for("127.0.0.1:9".parse().unwrap()).unwrap();
        assert!(tx.local_addr().unwrap().is_ipv4());
    }

    #[test]
    fn oversized_datagram_is_an_error() {
        let dest: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let mut tx = UdpTransport::bind_for(dest).unwrap();
        let payload = vec![0u8; 70_000];
        assert!(tx.send(dest, &payload).is_err());
    }
}
