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

use super::{TransportError, TransportOps};
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// TCP transport for MQTT connections.
///
/// Wraps an already established [`TcpStream`]: on the client side one
/// produced by [`connect_helper::connect_tcp`], on the server side one
/// accepted from a `TcpListener`.
///
/// # Examples
///
/// ```rust
/// use mqtt311_endpoint_tokio::mqtt_ep::transport::TcpTransport;
/// use tokio::net::TcpListener;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("127.0.0.1:1883").await?;
/// let (stream, _) = listener.accept().await?;
/// let transport = TcpTransport::from_stream(stream);
/// # Ok(())
/// # }
/// ```
///
/// [`connect_helper::connect_tcp`]: crate::mqtt_ep::transport::connect_helper::connect_tcp
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap an established TCP stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Mutable access to the underlying stream for socket options such as
    /// `set_nodelay`. The caller must not read or write through it.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Immutable access to the underlying stream for inspection.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

/// Write every byte of `buffers` to `stream`, looping over partial
/// vectored writes. A zero-byte write surfaces as `WriteZero`: the frame
/// count on the wire no longer matches what was submitted, which is fatal
/// for the endpoint.
pub(crate) async fn write_all_vectored<S>(
    stream: &mut S,
    buffers: &[IoSlice<'_>],
) -> Result<(), TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let total_bytes: usize = buffers.iter().map(|buf| buf.len()).sum();
    let mut skip = 0usize;

    while skip < total_bytes {
        // rebuild the slice list past the bytes already written
        let mut remaining = skip;
        let current: Vec<IoSlice> = buffers
            .iter()
            .filter_map(|buf| {
                if remaining >= buf.len() {
                    remaining -= buf.len();
                    None
                } else {
                    let slice = &buf[remaining..];
                    remaining = 0;
                    Some(IoSlice::new(slice))
                }
            })
            .collect();

        let written = stream
            .write_vectored(&current)
            .await
            .map_err(TransportError::Io)?;
        if written == 0 {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0 bytes written",
            )));
        }
        skip += written;
    }

    stream.flush().await.map_err(TransportError::Io)?;
    Ok(())
}

impl TransportOps for TcpTransport {
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
        Box::pin(async move { self.stream.read(buffer).await.map_err(TransportError::Io) })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout_duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            // best effort: on failure or timeout the stream is dropped by
            // the endpoint and the OS closes the connection
            let _ = timeout(timeout_duration, self.stream.shutdown()).await;
        })
    }
}
