//! Transports: TCP connect and the TLS handshake used for implicit TLS
//! and STARTTLS alike.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::ServerParams;
use crate::{Error, Result};

/// Anything a session can run over: sockets, TLS streams, in-memory pipes.
pub trait ImapIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> ImapIo for T {}

/// Type-erased transport owned by a running session.
pub type BoxedIo = Box<dyn ImapIo>;

/// Client config trusting the webpki root set; built on first use.
static CONNECTOR: LazyLock<TlsConnector> = LazyLock::new(|| {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
});

/// Opens the TCP connection to `params.host:params.port` within `timeout`.
///
/// # Errors
///
/// Returns [`Error::Timeout`] or the I/O error of the connect.
pub async fn connect_tcp(params: &ServerParams, timeout: Duration) -> Result<TcpStream> {
    let addr = (params.host.as_str(), params.port);
    tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(Error::from)
}

/// Runs the TLS handshake over `stream`, verifying the certificate
/// against `host`.
///
/// # Errors
///
/// Returns [`Error::InvalidDnsName`] if `host` cannot be used for
/// verification, or the I/O error of a failed handshake.
pub async fn tls_handshake<S>(stream: S, host: &str) -> Result<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = CONNECTOR.connect(server_name, stream).await?;
    tracing::debug!(host, "TLS established");
    Ok(tls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Security;

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let params = ServerParams::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .build();
        let err = connect_tcp(&params, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_connect_reaches_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let params = ServerParams::builder("127.0.0.1")
            .port(port)
            .security(Security::StartTls)
            .build();
        let (stream, accepted) = tokio::join!(
            connect_tcp(&params, Duration::from_secs(5)),
            listener.accept()
        );
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_handshake_rejects_unusable_host_name() {
        let (client, _server) = tokio::io::duplex(64);
        let err = tls_handshake(client, "not a host!").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }
}
