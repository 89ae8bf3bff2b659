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

//! Connection establishment helpers.
//!
//! These functions perform the network handshakes (TCP connect, TLS
//! handshake) and hand back a stream ready to wrap in a transport. The
//! endpoint itself never dials; certificate configuration stays with the
//! caller.

use super::TransportError;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// Establish a TCP connection, optionally bounded by `connect_timeout`.
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::transport::{TcpTransport, connect_helper};
/// use tokio::time::Duration;
///
/// let stream = connect_helper::connect_tcp(
///     "127.0.0.1:1883",
///     Some(Duration::from_secs(10)),
/// ).await?;
/// let transport = TcpTransport::from_stream(stream);
/// ```
pub async fn connect_tcp(
    addr: &str,
    connect_timeout: Option<Duration>,
) -> Result<TcpStream, TransportError> {
    let connect = TcpStream::connect(addr);
    match connect_timeout {
        Some(limit) => timeout(limit, connect)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::Io),
        None => connect.await.map_err(TransportError::Io),
    }
}

/// Establish a TCP connection and run the TLS handshake on top of it.
///
/// When `tls_config` is `None` a client configuration is built from the
/// platform's native root certificates. `domain` is the server name used
/// for certificate verification (SNI).
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::transport::{TlsTransport, connect_helper};
///
/// let tls_stream = connect_helper::connect_tcp_tls(
///     "broker.example.com:8883",
///     "broker.example.com",
///     None,
///     None,
/// ).await?;
/// let transport = TlsTransport::from_stream(tls_stream);
/// ```
#[cfg(feature = "tls")]
pub async fn connect_tcp_tls(
    addr: &str,
    domain: &str,
    tls_config: Option<std::sync::Arc<tokio_rustls::rustls::ClientConfig>>,
    connect_timeout: Option<Duration>,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, TransportError> {
    use tokio_rustls::{rustls, TlsConnector};

    let tcp_stream = connect_tcp(addr, connect_timeout).await?;

    let config = match tls_config {
        Some(config) => config,
        None => {
            let mut root_store = rustls::RootCertStore::empty();
            for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                let _ = root_store.add(&rustls::Certificate(cert.0));
            }
            std::sync::Arc::new(
                rustls::ClientConfig::builder()
                    .with_safe_defaults()
                    .with_root_certificates(root_store)
                    .with_no_client_auth(),
            )
        }
    };

    let server_name =
        rustls::ServerName::try_from(domain).map_err(|e| TransportError::Tls(Box::new(e)))?;
    let connector = TlsConnector::from(config);
    let handshake = connector.connect(server_name, tcp_stream);
    match connect_timeout {
        Some(limit) => timeout(limit, handshake)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Tls(Box::new(e))),
        None => handshake.await.map_err(|e| TransportError::Tls(Box::new(e))),
    }
}
