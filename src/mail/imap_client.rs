use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;

use anyhow::{Context, Result, anyhow, bail};
use native_tls::TlsConnector;

use crate::domain::email::NormalizedMail;
use crate::mail::diagnostics::{Diagnostics, Stage};
use crate::mail::normalize::Normalizer;

const DEFAULT_PORT: u16 = 993;
const FETCH_QUERY: &str = "BODY.PEEK[]";

/// Where and how to log in.
#[derive(Clone)]
pub struct ServerSettings {
    /// `host:port`
    pub address: String,
    pub tls: bool,
    pub tls_skip_verify: bool,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("address", &self.address)
            .field("tls", &self.tls)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Summary of the selected mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    /// Message count at selection time.
    pub messages: u32,
}

/// One entry of a bulk FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub seq: u32,
    /// Full RFC 822 message, if the server sent one.
    pub raw: Option<Vec<u8>>,
}

/// The IMAP operations the indexer needs from an authenticated session.
pub trait MailSession {
    /// Read-only select; returns the number of messages in the mailbox.
    fn examine(&mut self, mailbox: &str) -> Result<u32>;
    /// Fetch messages `first..=last` by sequence number in a single request.
    fn fetch_range(&mut self, first: u32, last: u32) -> Result<Vec<FetchedMessage>>;
    fn logout(&mut self) -> Result<()>;
}

impl<T: Read + Write> MailSession for imap::Session<T> {
    fn examine(&mut self, mailbox: &str) -> Result<u32> {
        let mbox = imap::Session::examine(self, mailbox)?;
        Ok(mbox.exists)
    }

    fn fetch_range(&mut self, first: u32, last: u32) -> Result<Vec<FetchedMessage>> {
        let fetches = imap::Session::fetch(self, format!("{first}:{last}"), FETCH_QUERY)?;
        Ok(fetches
            .iter()
            .map(|f| FetchedMessage {
                seq: f.message,
                raw: f.body().map(|b| b.to_vec()),
            })
            .collect())
    }

    fn logout(&mut self) -> Result<()> {
        imap::Session::logout(self)?;
        Ok(())
    }
}

/// Owns one IMAP session for a Connect -> SelectMailbox -> FetchAll -> Disconnect run.
pub struct ImapClient {
    settings: ServerSettings,
    normalizer: Normalizer,
    session: Option<Box<dyn MailSession>>,
    mailbox: Option<MailboxInfo>,
}

impl ImapClient {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings,
            normalizer: Normalizer::default(),
            session: None,
            mailbox: None,
        }
    }

    /// Use an already authenticated session instead of dialing.
    pub fn with_session(settings: ServerSettings, session: Box<dyn MailSession>) -> Self {
        Self {
            session: Some(session),
            ..Self::new(settings)
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn mailbox(&self) -> Option<&MailboxInfo> {
        self.mailbox.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Dial over TLS and log in. Plaintext connections are refused.
    pub fn connect(&mut self) -> Result<()> {
        if !self.settings.tls {
            bail!("connect server: TLS is required, plaintext IMAP is not supported");
        }

        let client = dial_tls(&self.settings).context("connect server")?;
        let session = login(client, &self.settings)?;

        log::debug!(
            "logged in to {} as {}",
            self.settings.address,
            self.settings.username
        );
        self.session = Some(Box::new(session));
        self.mailbox = None;
        Ok(())
    }

    /// Log out if connected; a no-op otherwise.
    pub fn disconnect(&mut self) -> Result<()> {
        self.mailbox = None;
        match self.session.take() {
            Some(mut session) => session.logout(),
            None => Ok(()),
        }
    }

    pub fn select_mailbox(&mut self, name: &str) -> Result<&MailboxInfo> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow!("select mailbox: not connected"))?;
        let messages = session.examine(name)?;
        log::info!("Mailbox {name} has {messages} mails");

        Ok(self.mailbox.insert(MailboxInfo {
            name: name.to_string(),
            messages,
        }))
    }

    /// Fetch and normalize every message of the selected mailbox.
    ///
    /// The result always holds one record per message counted at selection;
    /// messages the server did not return, or that failed to parse, keep
    /// default fields and are reported through the log.
    pub fn fetch_all(&mut self) -> Result<Vec<NormalizedMail>> {
        let mailbox = self
            .mailbox
            .clone()
            .ok_or_else(|| anyhow!("fetch mail: no mailbox selected"))?;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow!("fetch mail: not connected"))?;

        let total = mailbox.messages as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let fetched = session
            .fetch_range(1, mailbox.messages)
            .context("fetch mail")?;

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
        for f in fetched {
            let idx = (f.seq as usize).wrapping_sub(1);
            match f.raw {
                Some(raw) if idx < total => slots[idx] = Some(raw),
                Some(_) => log::debug!("ignoring message {} outside 1:{total}", f.seq),
                None => {}
            }
        }

        let mails = slots
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| {
                let mut diagnostics = Diagnostics::new();
                let mail = match raw {
                    Some(raw) => {
                        self.normalizer
                            .normalize_in_folder(&raw, &mailbox.name, &mut diagnostics)
                    }
                    None => {
                        diagnostics.push(Stage::Message, "server returned no message body");
                        NormalizedMail::default().with_folder(&mailbox.name)
                    }
                };
                diagnostics.log(&format!("{} message {}", mailbox.name, idx + 1));
                mail
            })
            .collect();

        Ok(mails)
    }
}

/// Authenticate with LOGIN; a rejection is tagged `login`.
fn login<T: Read + Write>(
    client: imap::Client<T>,
    settings: &ServerSettings,
) -> Result<imap::Session<T>> {
    client
        .login(&settings.username, &settings.password)
        .map_err(|(e, _client)| anyhow!("login: {e}"))
}

fn dial_tls(settings: &ServerSettings) -> Result<imap::Client<native_tls::TlsStream<TcpStream>>> {
    let (host, port) = split_host_port(&settings.address)?;

    let mut builder = TlsConnector::builder();
    if settings.tls_skip_verify {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    let tls = builder.build()?;

    Ok(imap::connect((host, port), host, &tls)?)
}

/// Split `host:port`; bracketed IPv6 literals are accepted and the port
/// defaults to 993.
pub fn split_host_port(address: &str) -> Result<(&str, u16)> {
    let address = address.trim();
    if address.is_empty() {
        bail!("empty server address");
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("unterminated IPv6 literal in {address:?}"))?;
        match tail.strip_prefix(':') {
            Some(p) => (host, Some(p)),
            None if tail.is_empty() => (host, None),
            None => bail!("unexpected text after IPv6 literal in {address:?}"),
        }
    } else {
        match address.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (address, None),
        }
    };

    if host.is_empty() {
        bail!("missing host in {address:?}");
    }
    let port = match port {
        Some(p) => p
            .parse()
            .with_context(|| format!("invalid port in {address:?}"))?,
        None => DEFAULT_PORT,
    };
    Ok((host, port))
}
