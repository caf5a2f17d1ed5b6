//! UDP datagram transport, used for the broadcast price feed. Sets
//! `SO_REUSEADDR`/`SO_BROADCAST`. One framed message per datagram.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use super::{IoResult, Transport};

pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl UdpTransport {
    /// Binds a broadcast-capable socket at `local_addr`.
    pub async fn bind_broadcast(local_addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket,
            peer: None,
        })
    }

    /// Connects to a fixed subscriber endpoint for unicast send/recv.
    pub async fn connected(local_addr: SocketAddr, peer: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(peer).await?;
        Ok(Self {
            socket,
            peer: Some(peer),
        })
    }

    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> IoResult {
        match self.socket.send_to(bytes, dest).await {
            Ok(_) => IoResult::Ok,
            Err(_) => IoResult::Error,
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv(&mut self, buf: &mut [u8]) -> (IoResult, usize) {
        match self.socket.recv(buf).await {
            Ok(n) => (IoResult::Ok, n),
            Err(_) => (IoResult::Error, 0),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> IoResult {
        let result = if let Some(peer) = self.peer {
            self.socket.send_to(bytes, peer).await
        } else {
            return IoResult::Error;
        };
        match result {
            Ok(_) => IoResult::Ok,
            Err(_) => IoResult::Error,
        }
    }

    fn close(&mut self) {
        // UDP sockets have no half-close; dropping the socket is the
        // caller's responsibility once it stops polling `recv`.
    }
}
