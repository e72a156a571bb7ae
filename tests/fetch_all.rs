use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use rs_mail_indexer::mail::imap_client::{FetchedMessage, ImapClient, MailSession, ServerSettings};
use rs_mail_indexer::mail::normalize::{HtmlOptions, Normalizer};

/// Replays canned responses and records the calls it receives.
#[derive(Default)]
struct ScriptedSession {
    count: u32,
    messages: Vec<FetchedMessage>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MailSession for ScriptedSession {
    fn examine(&mut self, mailbox: &str) -> Result<u32> {
        self.calls.lock().unwrap().push(format!("examine {mailbox}"));
        if mailbox == "Missing" {
            return Err(anyhow!("NO [NONEXISTENT] Unknown Mailbox"));
        }
        Ok(self.count)
    }

    fn fetch_range(&mut self, first: u32, last: u32) -> Result<Vec<FetchedMessage>> {
        self.calls.lock().unwrap().push(format!("fetch {first}:{last}"));
        Ok(self.messages.clone())
    }

    fn logout(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("logout".to_string());
        Ok(())
    }
}

fn settings() -> ServerSettings {
    ServerSettings {
        address: "imap.example.com:993".into(),
        tls: true,
        tls_skip_verify: false,
        username: "user".into(),
        password: "pw".into(),
    }
}

fn raw(subject: &str, body: &str) -> Vec<u8> {
    format!(
        "Message-ID: <{subject}@example.com>\r\nFrom: a@example.com\r\nSubject: {subject}\r\nContent-Type: text/plain\r\n\r\n{body}"
    )
    .into_bytes()
}

fn fetched(seq: u32, raw: Option<Vec<u8>>) -> FetchedMessage {
    FetchedMessage { seq, raw }
}

fn client(count: u32, messages: Vec<FetchedMessage>) -> (ImapClient, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let session = ScriptedSession {
        count,
        messages,
        calls: Arc::clone(&calls),
    };
    (ImapClient::with_session(settings(), Box::new(session)), calls)
}

#[test]
fn one_record_per_message_in_a_single_fetch() {
    let (mut imap, calls) = client(
        3,
        vec![
            fetched(1, Some(raw("one", "first"))),
            fetched(2, Some(raw("two", "second"))),
            fetched(3, Some(raw("three", "third"))),
        ],
    );

    let info = imap.select_mailbox("INBOX").unwrap();
    assert_eq!(info.messages, 3);

    let mails = imap.fetch_all().unwrap();
    assert_eq!(mails.len(), 3);
    assert_eq!(mails[0].subject, "one");
    assert_eq!(mails[2].id, "three@example.com");
    assert!(mails.iter().all(|m| m.folder == "Inbox"));

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["examine INBOX", "fetch 1:3"]);
}

#[test]
fn records_follow_sequence_order() {
    let (mut imap, _) = client(
        2,
        vec![
            fetched(2, Some(raw("two", "b"))),
            fetched(1, Some(raw("one", "a"))),
        ],
    );
    imap.select_mailbox("Archive").unwrap();

    let mails = imap.fetch_all().unwrap();
    assert_eq!(mails[0].subject, "one");
    assert_eq!(mails[1].subject, "two");
    assert_eq!(mails[1].folder, "Archive");
}

#[test]
fn missing_and_broken_messages_keep_their_slot() {
    let broken = b"Content-Type: multipart/mixed; boundary=\"Z\"\r\n\r\n--Z\r\nContent-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\n@@@@\r\n--Z--\r\n".to_vec();
    let (mut imap, _) = client(
        4,
        vec![
            fetched(1, Some(raw("one", "a"))),
            fetched(2, Some(broken)),
            // flags-only update without a body
            fetched(3, None),
            fetched(4, Some(raw("four", "d"))),
        ],
    );
    imap.select_mailbox("INBOX").unwrap();

    let mails = imap.fetch_all().unwrap();
    assert_eq!(mails.len(), 4);
    assert_eq!(mails[0].subject, "one");
    assert_eq!(mails[1].body, "");
    assert_eq!(mails[2].subject, "");
    assert_eq!(mails[2].folder, "Inbox");
    assert_eq!(mails[3].body.trim_end(), "d");
}

#[test]
fn out_of_range_responses_are_ignored() {
    let (mut imap, _) = client(
        1,
        vec![
            fetched(1, Some(raw("one", "a"))),
            fetched(7, Some(raw("stray", "x"))),
        ],
    );
    imap.select_mailbox("INBOX").unwrap();

    let mails = imap.fetch_all().unwrap();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].subject, "one");
}

#[test]
fn empty_mailbox_skips_the_fetch() {
    let (mut imap, calls) = client(0, Vec::new());
    imap.select_mailbox("INBOX").unwrap();

    assert!(imap.fetch_all().unwrap().is_empty());
    assert_eq!(calls.lock().unwrap().clone(), vec!["examine INBOX"]);
}

#[test]
fn fetch_requires_selected_mailbox() {
    let (mut imap, _) = client(1, Vec::new());
    assert!(imap.fetch_all().is_err());
}

#[test]
fn select_error_is_returned() {
    let (mut imap, _) = client(1, Vec::new());
    let err = imap.select_mailbox("Missing").unwrap_err();
    assert!(err.to_string().contains("NONEXISTENT"));
    assert!(imap.mailbox().is_none());
}

#[test]
fn disconnect_logs_out_once() {
    let (mut imap, calls) = client(0, Vec::new());
    assert!(imap.is_connected());

    imap.disconnect().unwrap();
    imap.disconnect().unwrap();

    assert!(!imap.is_connected());
    assert_eq!(calls.lock().unwrap().clone(), vec!["logout"]);
}

#[test]
fn custom_normalizer_is_used_for_html() {
    let html = b"Content-Type: text/html\r\n\r\n<p>one two three four five six seven eight nine ten</p>".to_vec();
    let (imap, _) = client(1, vec![fetched(1, Some(html))]);
    let mut imap = imap.with_normalizer(Normalizer::new(HtmlOptions {
        width: 20,
        pretty_tables: false,
    }));
    imap.select_mailbox("INBOX").unwrap();

    let mails = imap.fetch_all().unwrap();
    assert!(mails[0].body.contains('\n'), "{:?}", mails[0].body);
    assert!(mails[0].body.starts_with("one two"));
}
