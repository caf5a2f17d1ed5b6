//! TCP stream transport. Sets `TCP_NODELAY` — matching elimination of
//! Nagle's algorithm expected of a low-latency order-entry socket.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{IoResult, Transport};

pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn recv(&mut self, buf: &mut [u8]) -> (IoResult, usize) {
        let Some(stream) = self.stream.as_mut() else {
            return (IoResult::Closed, 0);
        };
        match stream.read(buf).await {
            Ok(0) => (IoResult::Closed, 0),
            Ok(n) => (IoResult::Ok, n),
            Err(_) => (IoResult::Error, 0),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> IoResult {
        let Some(stream) = self.stream.as_mut() else {
            return IoResult::Closed;
        };
        match stream.write_all(bytes).await {
            Ok(()) => IoResult::Ok,
            Err(_) => IoResult::Error,
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }
}
