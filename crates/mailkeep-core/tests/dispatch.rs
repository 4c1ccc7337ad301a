//! Dispatch flow against a scripted local SMTP server.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use mailkeep_core::{
    BlobStore, Database, Mail, Mailbox, MailboxDefaults, MailboxId, Security, SmtpServer,
    archive_message, dispatch_queued,
};

/// How the scripted server answers RCPT TO.
#[derive(Clone, Copy)]
enum RcptBehavior {
    Accept,
    Reject(u16),
}

#[derive(Default)]
struct ServerLog {
    connections: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

async fn spawn_server(behavior: RcptBehavior) -> (SocketAddr, Arc<ServerLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(ServerLog::default());

    let accept_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            accept_log.connections.fetch_add(1, Ordering::SeqCst);
            let conn_log = Arc::clone(&accept_log);
            tokio::spawn(handle_connection(stream, behavior, conn_log));
        }
    });

    (addr, log)
}

async fn handle_connection(stream: TcpStream, behavior: RcptBehavior, log: Arc<ServerLog>) {
    let mut reader = BufReader::new(stream);
    let _ = reader.get_mut().write_all(b"220 fake ESMTP\r\n").await;

    let mut in_data = false;
    let mut line = String::new();
    loop {
        line.clear();
        let Ok(n) = reader.read_line(&mut line).await else {
            break;
        };
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end().to_string();

        if in_data {
            if trimmed == "." {
                in_data = false;
                let _ = reader.get_mut().write_all(b"250 queued\r\n").await;
            }
            continue;
        }

        log.commands.lock().await.push(trimmed.clone());
        let upper = trimmed.to_uppercase();

        let reply: Vec<u8> = if upper.starts_with("EHLO") {
            b"250-fake greets you\r\n250 SIZE 1000000\r\n".to_vec()
        } else if upper.starts_with("RCPT TO") {
            match behavior {
                RcptBehavior::Accept => b"250 OK\r\n".to_vec(),
                RcptBehavior::Reject(code) => format!("{code} no\r\n").into_bytes(),
            }
        } else if upper.starts_with("DATA") {
            in_data = true;
            b"354 go ahead\r\n".to_vec()
        } else if upper.starts_with("QUIT") {
            let _ = reader.get_mut().write_all(b"221 bye\r\n").await;
            break;
        } else {
            b"250 OK\r\n".to_vec()
        };

        if reader.get_mut().write_all(&reply).await.is_err() {
            break;
        }
    }
}

struct Fixture {
    db: Database,
    store: BlobStore,
    _dir: tempfile::TempDir,
    sent: MailboxId,
    error: MailboxId,
    outbox: MailboxId,
}

async fn fixture(addr: SocketAddr) -> Fixture {
    let db = Database::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mut sent = Mailbox::new("Sent");
    let mut draft = Mailbox::new("Drafts");
    let mut error = Mailbox::new("Errors");
    let mut outbox = Mailbox::new("Outbox");
    outbox.smtp = Some(SmtpServer {
        host: addr.ip().to_string(),
        port: addr.port(),
        security: Security::None,
        username: String::new(),
        password: String::new(),
        sender: Some("robot@example.com".to_string()),
    });

    for mailbox in [&mut sent, &mut draft, &mut error, &mut outbox] {
        db.mailboxes().save(mailbox).await.unwrap();
    }

    let defaults = MailboxDefaults::global(
        sent.id.unwrap(),
        draft.id.unwrap(),
        error.id.unwrap(),
        outbox.id.unwrap(),
    );
    db.defaults().set(&defaults).await.unwrap();

    Fixture {
        db,
        store,
        _dir: dir,
        sent: sent.id.unwrap(),
        error: error.id.unwrap(),
        outbox: outbox.id.unwrap(),
    }
}

async fn queue_message(fixture: &Fixture, subject: &str) -> Mail {
    let raw = format!(
        "From: jane@example.com\r\nTo: john@example.org\r\nSubject: {subject}\r\n\r\nbody of {subject}\r\n"
    );
    archive_message(&fixture.db, &fixture.store, fixture.outbox, raw.as_bytes())
        .await
        .unwrap()
}

#[tokio::test]
async fn delivers_queue_over_one_connection() {
    let (addr, log) = spawn_server(RcptBehavior::Accept).await;
    let fixture = fixture(addr).await;

    queue_message(&fixture, "first").await;
    queue_message(&fixture, "second").await;

    let report = dispatch_queued(&fixture.db, &fixture.store).await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.deferred, 0);

    // Both records moved to the sent mailbox and flagged
    assert!(fixture.db.mails().queued(fixture.outbox).await.unwrap().is_empty());
    let delivered = fixture.db.mails().list_by_mailbox(fixture.sent).await.unwrap();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|m| m.flags.sent));

    // One connection carried both transactions
    assert_eq!(log.connections.load(Ordering::SeqCst), 1);
    let commands = log.commands.lock().await;
    let mail_froms = commands.iter().filter(|c| c.starts_with("MAIL FROM")).count();
    assert_eq!(mail_froms, 2);
    assert!(commands.iter().any(|c| c == "MAIL FROM:<jane@example.com>"));
}

#[tokio::test]
async fn permanent_rejection_files_into_error_mailbox() {
    let (addr, _log) = spawn_server(RcptBehavior::Reject(550)).await;
    let fixture = fixture(addr).await;

    let mail = queue_message(&fixture, "doomed").await;

    let report = dispatch_queued(&fixture.db, &fixture.store).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 1);

    let moved = fixture.db.mails().get(mail.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(moved.mailbox, fixture.error);
    assert_eq!(moved.attempts, 1);
    assert!(!moved.flags.sent);
}

#[tokio::test]
async fn transient_rejection_retries_then_gives_up() {
    let (addr, _log) = spawn_server(RcptBehavior::Reject(451)).await;
    let fixture = fixture(addr).await;

    let mail = queue_message(&fixture, "flaky").await;
    let id = mail.id.unwrap();

    // Two runs defer and keep the record queued
    for expected_attempts in 1..=2 {
        let report = dispatch_queued(&fixture.db, &fixture.store).await.unwrap();
        assert_eq!(report.deferred, 1);
        let pending = fixture.db.mails().get(id).await.unwrap().unwrap();
        assert_eq!(pending.mailbox, fixture.outbox);
        assert_eq!(pending.attempts, expected_attempts);
    }

    // The third attempt exhausts the budget
    let report = dispatch_queued(&fixture.db, &fixture.store).await.unwrap();
    assert_eq!(report.failed, 1);
    let given_up = fixture.db.mails().get(id).await.unwrap().unwrap();
    assert_eq!(given_up.mailbox, fixture.error);
    assert_eq!(given_up.attempts, 3);
}
