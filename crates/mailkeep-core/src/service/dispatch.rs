//! SMTP dispatch of queued mail.
//!
//! The host application's scheduler calls [`dispatch_queued`] periodically.
//! Queued mail is grouped by outbox mailbox, each group is sent over one
//! SMTP session resolved from that mailbox's server settings, and every
//! record ends up marked sent, filed into the error mailbox, or left
//! queued for the next run.

use mailkeep_smtp::{Address, Client, Session, transport};
use tracing::{debug, info, warn};

use crate::defaults::MailboxDefaults;
use crate::mail::Mail;
use crate::mailbox::{Security, SmtpServer};
use crate::service::archive::fetch_original;
use crate::store::BlobStore;
use crate::{Database, Error, Result};

/// Delivery attempts before a message is filed into the error mailbox.
pub const MAX_SEND_ATTEMPTS: i64 = 3;

/// HELO/EHLO name presented to servers.
const HELO_NAME: &str = "localhost";

/// Totals of one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages delivered and filed into the sent mailbox.
    pub sent: usize,
    /// Messages filed into the error mailbox.
    pub failed: usize,
    /// Messages left queued for a later run.
    pub deferred: usize,
}

/// Envelope derived from a mail record.
#[derive(Debug)]
struct SendEnvelope {
    from: Address,
    recipients: Vec<Address>,
}

/// Dispatches every configured outbox. This is the cron entry point.
///
/// # Errors
///
/// Returns an error on database or blob-store failures. SMTP failures are
/// per-message outcomes recorded in the report, not errors.
pub async fn dispatch_queued(db: &Database, store: &BlobStore) -> Result<DispatchReport> {
    let mut report = DispatchReport::default();

    let scopes = db.defaults().list().await?;
    if scopes.is_empty() {
        warn!("no mailbox defaults configured; nothing to dispatch");
        return Ok(report);
    }

    for defaults in scopes {
        dispatch_outbox(db, store, &defaults, &mut report).await?;
    }

    info!(
        sent = report.sent,
        failed = report.failed,
        deferred = report.deferred,
        "dispatch run finished"
    );
    Ok(report)
}

/// Dispatches the queue of one outbox over a single SMTP session.
///
/// A connection failure defers the whole group; per-message failures file
/// the record into the error mailbox (permanent rejections, or after
/// [`MAX_SEND_ATTEMPTS`] tries) or leave it queued.
///
/// # Errors
///
/// Returns an error on database or blob-store failures.
pub async fn dispatch_outbox(
    db: &Database,
    store: &BlobStore,
    defaults: &MailboxDefaults,
    report: &mut DispatchReport,
) -> Result<()> {
    let queued = db.mails().queued(defaults.outbox).await?;
    if queued.is_empty() {
        return Ok(());
    }

    let Some(outbox) = db.mailboxes().get(defaults.outbox).await? else {
        warn!(outbox = %defaults.outbox, "outbox mailbox missing; deferring its queue");
        report.deferred += queued.len();
        return Ok(());
    };
    let Some(server) = outbox.smtp else {
        warn!(outbox = %outbox.name, "outbox has no SMTP server; deferring its queue");
        report.deferred += queued.len();
        return Ok(());
    };

    let mut session = match open_session(&server).await {
        Ok(session) => Some(session),
        Err(err) => {
            warn!(host = %server.host, error = %err, "SMTP connection failed; deferring queue");
            report.deferred += queued.len();
            return Ok(());
        }
    };

    let mails = db.mails();
    for mail in &queued {
        let Some(id) = mail.id else { continue };

        let Some(client) = session.take() else {
            report.deferred += 1;
            continue;
        };

        let Some(payload) = fetch_original(store, mail).await? else {
            warn!(mail = %mail.display_name(), "raw message missing from store");
            mails.move_to_mailbox(id, defaults.error).await?;
            report.failed += 1;
            session = Some(client);
            continue;
        };

        let envelope = match build_envelope(mail, &server) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(mail = %mail.display_name(), error = %err, "unusable envelope");
                mails.move_to_mailbox(id, defaults.error).await?;
                report.failed += 1;
                session = Some(client);
                continue;
            }
        };

        match transmit(client, &envelope, &payload).await {
            Ok(next) => {
                session = Some(next);
                mails.mark_sent(id).await?;
                mails.move_to_mailbox(id, defaults.sent).await?;
                report.sent += 1;
                info!(mail = %mail.display_name(), "delivered");
            }
            Err(err) => {
                let attempts = mails.record_attempt(id).await?;
                if err.is_permanent() || attempts >= MAX_SEND_ATTEMPTS {
                    mails.move_to_mailbox(id, defaults.error).await?;
                    report.failed += 1;
                    warn!(
                        mail = %mail.display_name(),
                        attempts,
                        error = %err,
                        "delivery failed permanently"
                    );
                } else {
                    report.deferred += 1;
                    warn!(
                        mail = %mail.display_name(),
                        attempts,
                        error = %err,
                        "delivery failed; will retry"
                    );
                }

                // The failed transaction left the connection in an unknown
                // state; reopen it for the rest of the group.
                session = match open_session(&server).await {
                    Ok(fresh) => Some(fresh),
                    Err(reconnect) => {
                        warn!(host = %server.host, error = %reconnect, "reconnect failed");
                        None
                    }
                };
            }
        }
    }

    if let Some(client) = session.take()
        && let Err(err) = client.quit().await
    {
        debug!(error = %err, "QUIT failed");
    }

    Ok(())
}

/// Resolves connection security, STARTTLS, and authentication for one
/// mailbox's server settings.
async fn open_session(server: &SmtpServer) -> Result<Client<Session>> {
    let conn = match server.security {
        Security::Tls => transport::connect_tls(&server.host, server.port).await?,
        Security::StartTls | Security::None => {
            transport::connect(&server.host, server.port).await?
        }
    };

    let mut client = Client::handshake(conn, HELO_NAME).await?;

    if server.security == Security::StartTls {
        client = client.starttls(&server.host, HELO_NAME).await?;
    }

    if !server.username.is_empty() {
        client = if client.caps().supports_auth("LOGIN") && !client.caps().supports_auth("PLAIN") {
            client.auth_login(&server.username, &server.password).await?
        } else {
            client.auth_plain(&server.username, &server.password).await?
        };
    }

    Ok(client)
}

/// Runs one mail transaction and returns the session for the next one.
async fn transmit(
    client: Client<Session>,
    envelope: &SendEnvelope,
    raw: &[u8],
) -> mailkeep_smtp::Result<Client<Session>> {
    let mut recipients = envelope.recipients.iter();
    let Some(first) = recipients.next() else {
        return Err(mailkeep_smtp::Error::Protocol("No recipients".to_string()));
    };

    let transaction = client.mail_from(&envelope.from).await?;
    let mut with_rcpt = transaction.rcpt_to(first).await?;
    for addr in recipients {
        with_rcpt = with_rcpt.rcpt_to(addr).await?;
    }

    with_rcpt.data().await?.finish(raw).await
}

/// Builds the SMTP envelope for a record: Sender/From (falling back to the
/// server's configured sender) plus every To/CC/BCC entry.
fn build_envelope(mail: &Mail, server: &SmtpServer) -> Result<SendEnvelope> {
    let from_raw = mail
        .envelope_sender()
        .map(str::to_string)
        .or_else(|| server.sender.clone())
        .ok_or_else(|| Error::BadEnvelope("no sender address".to_string()))?;
    let from = Address::parse(&from_raw).map_err(|e| Error::BadEnvelope(e.to_string()))?;

    let entries = mail.recipient_entries();
    if entries.is_empty() {
        return Err(Error::BadEnvelope("no recipients".to_string()));
    }

    let recipients = entries
        .into_iter()
        .map(Address::parse)
        .collect::<mailkeep_smtp::Result<Vec<_>>>()
        .map_err(|e| Error::BadEnvelope(e.to_string()))?;

    Ok(SendEnvelope { from, recipients })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mail::Mail;
    use crate::mailbox::{Mailbox, MailboxId};

    fn server() -> SmtpServer {
        SmtpServer {
            host: "mail.example.com".to_string(),
            port: 587,
            security: Security::StartTls,
            username: String::new(),
            password: String::new(),
            sender: Some("fallback@example.com".to_string()),
        }
    }

    #[test]
    fn envelope_uses_record_sender() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.from_ = "Jane <jane@example.com>".to_string();
        mail.to = "a@example.org, B <b@example.org>".to_string();

        let envelope = build_envelope(&mail, &server()).unwrap();
        assert_eq!(envelope.from.as_str(), "jane@example.com");
        assert_eq!(envelope.recipients.len(), 2);
        assert_eq!(envelope.recipients[1].as_str(), "b@example.org");
    }

    #[test]
    fn envelope_falls_back_to_server_sender() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.to = "a@example.org".to_string();

        let envelope = build_envelope(&mail, &server()).unwrap();
        assert_eq!(envelope.from.as_str(), "fallback@example.com");
    }

    #[test]
    fn envelope_requires_some_sender() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.to = "a@example.org".to_string();

        let mut no_sender = server();
        no_sender.sender = None;

        assert!(matches!(
            build_envelope(&mail, &no_sender),
            Err(Error::BadEnvelope(_))
        ));
    }

    #[test]
    fn envelope_requires_recipients() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.from_ = "jane@example.com".to_string();

        assert!(matches!(
            build_envelope(&mail, &server()),
            Err(Error::BadEnvelope(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_without_configuration_is_a_no_op() {
        let db = crate::Database::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let report = dispatch_queued(&db, &store).await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn outbox_without_server_defers_its_queue() {
        let db = crate::Database::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let mut ids = Vec::new();
        for name in ["Sent", "Drafts", "Errors", "Outbox"] {
            let mut mailbox = Mailbox::new(name);
            db.mailboxes().save(&mut mailbox).await.unwrap();
            ids.push(mailbox.id.unwrap());
        }
        let defaults = MailboxDefaults::global(ids[0], ids[1], ids[2], ids[3]);
        db.defaults().set(&defaults).await.unwrap();

        let mut mail = Mail::new(ids[3]);
        mail.from_ = "jane@example.com".to_string();
        mail.to = "john@example.org".to_string();
        db.mails().save(&mut mail).await.unwrap();

        let report = dispatch_queued(&db, &store).await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(report.sent, 0);

        // Still queued for the next run
        assert_eq!(db.mails().queued(ids[3]).await.unwrap().len(), 1);
    }
}
