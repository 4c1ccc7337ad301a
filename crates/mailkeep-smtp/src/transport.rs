//! Low-level connection transport (plain TCP or TLS).

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// The wire connection to an SMTP server.
#[derive(Debug)]
pub enum Transport {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl Transport {
    /// Reads one line, with the trailing CRLF stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        match self {
            Self::Tcp(reader) => {
                reader.read_line(&mut line).await?;
            }
            Self::Tls(reader) => {
                reader.read_line(&mut line).await?;
            }
        }
        Ok(line.trim_end().to_string())
    }

    /// Writes raw bytes and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Writes one command line, appending CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write_all(&data).await
    }

    /// Upgrades a plain TCP transport to TLS (STARTTLS).
    ///
    /// # Errors
    ///
    /// Returns an error if already on TLS or if the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".to_string())),
        };

        let connector = tls_connector();
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

        let tls = connector.connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }
}

/// Connects over plain TCP (port 25/587 style).
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<Transport> {
    let stream = TcpStream::connect((hostname, port)).await?;
    Ok(Transport::Tcp(BufReader::new(stream)))
}

/// Connects with implicit TLS (port 465 style).
///
/// # Errors
///
/// Returns an error if the connection or handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<Transport> {
    let tcp = TcpStream::connect((hostname, port)).await?;

    let connector = tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    let tls = connector.connect(server_name, tcp).await?;
    Ok(Transport::Tls(Box::new(BufReader::new(tls))))
}

/// Builds a TLS connector trusting the webpki root set.
fn tls_connector() -> TlsConnector {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
