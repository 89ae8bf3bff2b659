// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use super::tcp::write_all_vectored;
use super::{TransportError, TransportOps};
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_rustls::client::TlsStream;

/// TLS transport for MQTT connections.
///
/// Wraps an already established client-side TLS stream, produced by
/// [`connect_helper::connect_tcp_tls`]. The endpoint sees the same byte
/// stream contract as plain TCP; encryption is transparent.
///
/// A TLS "short read" - the peer dropping the connection without
/// `close_notify` - is reported as a clean close (`Ok(0)`), matching the
/// treatment of an orderly TCP shutdown.
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::transport::{TlsTransport, connect_helper};
///
/// let tls_stream = connect_helper::connect_tcp_tls("broker:8883", "broker", None, None).await?;
/// let transport = TlsTransport::from_stream(tls_stream);
/// ```
///
/// [`connect_helper::connect_tcp_tls`]: crate::mqtt_ep::transport::connect_helper::connect_tcp_tls
#[derive(Debug)]
pub struct TlsTransport {
    stream: TlsStream<TcpStream>,
}

impl TlsTransport {
    /// Wrap an established TLS stream.
    pub fn from_stream(stream: TlsStream<TcpStream>) -> Self {
        Self { stream }
    }
}

impl TransportOps for TlsTransport {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(write_all_vectored(&mut self.stream, buffers))
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            match self.stream.read(buffer).await {
                Ok(n) => Ok(n),
                // missing close_notify: treat as clean close
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
                Err(e) => Err(TransportError::Io(e)),
            }
        })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout_duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let _ = timeout(timeout_duration, self.stream.shutdown()).await;
        })
    }
}
