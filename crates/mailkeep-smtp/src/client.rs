//! Type-state SMTP client.
//!
//! State transitions consume the client, so only protocol-legal command
//! sequences compile:
//!
//! ```text
//! handshake -> Session -- mail_from --> Envelope -- rcpt_to --> Rcpt
//!     Rcpt -- rcpt_to --> Rcpt
//!     Rcpt -- data --> Sending -- finish --> Session
//! ```
//!
//! `finish` returns the client to `Session`, so one connection can carry
//! any number of sequential transactions.

use crate::address::Address;
use crate::error::Result;
use crate::reply::{Reply, ReplyCode};
use crate::transport::Transport;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;
use tracing::debug;

/// Capabilities advertised in the EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerCaps {
    /// Hostname from the server greeting.
    pub hostname: String,
    /// STARTTLS advertised.
    pub starttls: bool,
    /// 8BITMIME advertised.
    pub eightbitmime: bool,
    /// SIZE limit, when advertised with a value.
    pub max_size: Option<usize>,
    /// AUTH mechanisms, uppercased.
    pub auth: Vec<String>,
}

impl ServerCaps {
    /// Parses capability lines from an EHLO reply (greeting line excluded).
    #[must_use]
    pub fn parse(lines: &[String]) -> Self {
        let mut caps = Self::default();
        for line in lines {
            let mut words = line.split_whitespace();
            match words.next().map(str::to_uppercase).as_deref() {
                Some("STARTTLS") => caps.starttls = true,
                Some("8BITMIME") => caps.eightbitmime = true,
                Some("SIZE") => caps.max_size = words.next().and_then(|v| v.parse().ok()),
                Some("AUTH") => {
                    caps.auth = words.map(str::to_uppercase).collect();
                }
                _ => {}
            }
        }
        caps
    }

    /// Checks whether an AUTH mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth.iter().any(|m| m == mechanism)
    }
}

/// Marker: connection greeted and EHLO exchanged; no open transaction.
#[derive(Debug)]
pub struct Session;

/// Marker: MAIL FROM accepted, awaiting recipients.
#[derive(Debug)]
pub struct Envelope;

/// Marker: at least one recipient accepted.
#[derive(Debug)]
pub struct Rcpt;

/// Marker: DATA accepted, message payload may be sent.
#[derive(Debug)]
pub struct Sending;

/// SMTP client, parameterized over the protocol state.
#[derive(Debug)]
pub struct Client<State> {
    transport: Transport,
    caps: ServerCaps,
    _state: PhantomData<State>,
}

impl Client<Session> {
    /// Reads the server greeting and performs the EHLO exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting or EHLO is rejected.
    pub async fn handshake(mut transport: Transport, helo_name: &str) -> Result<Self> {
        let greeting = read_reply(&mut transport).await?.expect_success()?;
        let hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(server = %hostname, "SMTP greeting received");

        let mut client = Self {
            transport,
            caps: ServerCaps {
                hostname,
                ..ServerCaps::default()
            },
            _state: PhantomData,
        };
        client.ehlo(helo_name).await?;
        Ok(client)
    }

    /// Re-runs EHLO and refreshes the capability set.
    async fn ehlo(&mut self, helo_name: &str) -> Result<()> {
        let reply = command(&mut self.transport, &format!("EHLO {helo_name}"))
            .await?
            .expect_success()?;
        let hostname = std::mem::take(&mut self.caps.hostname);
        self.caps = ServerCaps::parse(reply.lines.get(1..).unwrap_or_default());
        self.caps.hostname = hostname;
        Ok(())
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub const fn caps(&self) -> &ServerCaps {
        &self.caps
    }

    /// Upgrades the connection with STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, hostname: &str, helo_name: &str) -> Result<Self> {
        if !self.caps.starttls {
            return Err(crate::Error::NotSupported("STARTTLS".to_string()));
        }

        command(&mut self.transport, "STARTTLS")
            .await?
            .expect(ReplyCode::SERVICE_READY)?;

        self.transport = self.transport.upgrade_to_tls(hostname).await?;
        self.ehlo(helo_name).await?;
        Ok(self)
    }

    /// Authenticates with AUTH PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn auth_plain(mut self, username: &str, password: &str) -> Result<Self> {
        let token = STANDARD.encode(format!("\0{username}\0{password}"));
        command(&mut self.transport, &format!("AUTH PLAIN {token}"))
            .await?
            .expect(ReplyCode::AUTH_SUCCESS)?;
        debug!(user = %username, "authenticated (PLAIN)");
        Ok(self)
    }

    /// Authenticates with AUTH LOGIN (username and password prompts).
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn auth_login(mut self, username: &str, password: &str) -> Result<Self> {
        command(&mut self.transport, "AUTH LOGIN")
            .await?
            .expect(ReplyCode::AUTH_CONTINUE)?;
        command(&mut self.transport, &STANDARD.encode(username))
            .await?
            .expect(ReplyCode::AUTH_CONTINUE)?;
        command(&mut self.transport, &STANDARD.encode(password))
            .await?
            .expect(ReplyCode::AUTH_SUCCESS)?;
        debug!(user = %username, "authenticated (LOGIN)");
        Ok(self)
    }

    /// Opens a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the sender.
    pub async fn mail_from(mut self, from: &Address) -> Result<Client<Envelope>> {
        command(&mut self.transport, &format!("MAIL FROM:<{from}>"))
            .await?
            .expect_success()?;
        Ok(self.transition())
    }
}

impl Client<Envelope> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<Rcpt>> {
        command(&mut self.transport, &format!("RCPT TO:<{to}>"))
            .await?
            .expect_success()?;
        Ok(self.transition())
    }

    /// Aborts the transaction with RSET.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Session>> {
        command(&mut self.transport, "RSET").await?.expect_success()?;
        Ok(self.transition())
    }
}

impl Client<Rcpt> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        command(&mut self.transport, &format!("RCPT TO:<{to}>"))
            .await?
            .expect_success()?;
        Ok(self)
    }

    /// Switches to payload mode with DATA.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not accept DATA.
    pub async fn data(mut self) -> Result<Client<Sending>> {
        command(&mut self.transport, "DATA")
            .await?
            .expect(ReplyCode::START_DATA)?;
        Ok(self.transition())
    }

    /// Aborts the transaction with RSET.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Session>> {
        command(&mut self.transport, "RSET").await?.expect_success()?;
        Ok(self.transition())
    }
}

impl Client<Sending> {
    /// Transmits the message payload and closes the transaction.
    ///
    /// Line endings are normalized to CRLF, leading dots are stuffed, and
    /// the terminating `.` line is appended. On success the client returns
    /// to `Session` for the next transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if transmission fails or the server rejects the
    /// message.
    pub async fn finish(mut self, raw: &[u8]) -> Result<Client<Session>> {
        let payload = stuff_payload(raw);
        self.transport.write_all(&payload).await?;
        read_reply(&mut self.transport).await?.expect_success()?;
        Ok(self.transition())
    }
}

impl<State> Client<State> {
    /// Sends QUIT and drops the connection (legal in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = command(&mut self.transport, "QUIT").await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return reply.expect_success().map(|_| ());
        }
        Ok(())
    }

    fn transition<Next>(self) -> Client<Next> {
        Client {
            transport: self.transport,
            caps: self.caps,
            _state: PhantomData,
        }
    }
}

/// Sends one command line and reads the complete reply.
async fn command(transport: &mut Transport, line: &str) -> Result<Reply> {
    transport.write_line(line).await?;
    read_reply(transport).await
}

/// Collects the lines of one (possibly multi-line) reply.
async fn read_reply(transport: &mut Transport) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = transport.read_line().await?;
        if line.is_empty() {
            continue;
        }
        let last = Reply::is_final_line(&line);
        lines.push(line);
        if last {
            break;
        }
    }
    Reply::parse(&lines)
}

/// Normalizes line endings to CRLF, stuffs leading dots, and appends the
/// end-of-data marker.
fn stuff_payload(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 8);

    for line in raw.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn caps_parse_common_extensions() {
        let lines = vec![
            "STARTTLS".to_string(),
            "SIZE 35882577".to_string(),
            "8BITMIME".to_string(),
            "AUTH PLAIN LOGIN XOAUTH2".to_string(),
        ];
        let caps = ServerCaps::parse(&lines);
        assert!(caps.starttls);
        assert!(caps.eightbitmime);
        assert_eq!(caps.max_size, Some(35_882_577));
        assert!(caps.supports_auth("PLAIN"));
        assert!(caps.supports_auth("LOGIN"));
        assert!(!caps.supports_auth("CRAM-MD5"));
    }

    #[test]
    fn caps_parse_size_without_value() {
        let caps = ServerCaps::parse(&["SIZE".to_string()]);
        assert_eq!(caps.max_size, None);
    }

    #[test]
    fn caps_parse_is_case_insensitive() {
        let caps = ServerCaps::parse(&["starttls".to_string(), "auth plain".to_string()]);
        assert!(caps.starttls);
        assert!(caps.supports_auth("PLAIN"));
    }

    #[test]
    fn stuffing_normalizes_and_escapes() {
        let raw = b"line one\n.starts with dot\r\nlast";
        let stuffed = stuff_payload(raw);
        assert_eq!(
            stuffed,
            b"line one\r\n..starts with dot\r\nlast\r\n.\r\n".to_vec()
        );
    }

    #[test]
    fn stuffing_empty_payload() {
        assert_eq!(stuff_payload(b""), b"\r\n.\r\n".to_vec());
    }
}
