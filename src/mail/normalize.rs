use anyhow::{Result, bail};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::domain::email::NormalizedMail;
use crate::mail::decoders::{decode_subject, parse_message_id, render_date, unfold};
use crate::mail::diagnostics::{Diagnostics, Stage};

/// How HTML bodies are flattened to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Wrap width handed to html2text.
    pub width: usize,
    /// Draw table borders.
    pub pretty_tables: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            pretty_tables: false,
        }
    }
}

/// A leaf MIME part, classified by its Content-Disposition and type.
#[derive(Debug, Clone, Copy)]
pub enum PartKind<'a> {
    Inline(&'a ParsedMail<'a>),
    Attachment(&'a ParsedMail<'a>),
}

impl<'a> PartKind<'a> {
    /// Inline when the disposition says `inline`, or when there is no
    /// `attachment` disposition and the part is `text/*`. Everything else,
    /// including binary parts without any disposition, is an attachment.
    pub fn classify(part: &'a ParsedMail<'a>) -> Self {
        // mailparse reports a missing header as Inline
        let declared = part.headers.get_first_header("Content-Disposition").is_some();
        let disposition = part.get_content_disposition().disposition;
        let is_text = part.ctype.mimetype.to_ascii_lowercase().starts_with("text/");

        match disposition {
            DispositionType::Inline if declared => PartKind::Inline(part),
            DispositionType::Attachment => PartKind::Attachment(part),
            _ if is_text => PartKind::Inline(part),
            _ => PartKind::Attachment(part),
        }
    }
}

/// Leaf parts in document order. A single-part message is its own only part.
pub fn mime_parts<'a>(
    mail: &'a ParsedMail<'a>,
    diagnostics: &mut Diagnostics,
) -> Vec<PartKind<'a>> {
    let mut out = Vec::new();
    walk(mail, &mut out, diagnostics);
    out
}

fn walk<'a>(
    part: &'a ParsedMail<'a>,
    out: &mut Vec<PartKind<'a>>,
    diagnostics: &mut Diagnostics,
) {
    if part.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/") {
        if part.subparts.is_empty() {
            diagnostics.push(
                Stage::Part,
                format!("{} container has no parts", part.ctype.mimetype),
            );
        }
        for sub in &part.subparts {
            walk(sub, out, diagnostics);
        }
        return;
    }
    out.push(PartKind::classify(part));
}

/// Flatten HTML to plain text.
pub fn html_to_text(html: &str, opts: &HtmlOptions) -> Result<String> {
    let config = html2text::config::plain();
    let config = if opts.pretty_tables {
        config
    } else {
        config.no_table_borders()
    };
    let text = config.string_from_read(html.as_bytes(), opts.width)?;
    Ok(text.trim_end().to_string())
}

/// Turns raw RFC 822 messages into [`NormalizedMail`] records.
///
/// Nothing here fails: every problem lands in the [`Diagnostics`] passed in and
/// the affected field keeps its fallback value.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    html: HtmlOptions,
}

impl Normalizer {
    pub fn new(html: HtmlOptions) -> Self {
        Self { html }
    }

    pub fn normalize(&self, raw: &[u8], diagnostics: &mut Diagnostics) -> NormalizedMail {
        let parsed = match mailparse::parse_mail(raw) {
            Ok(p) => p,
            Err(e) => {
                diagnostics.push(Stage::Message, e.to_string());
                return NormalizedMail::default();
            }
        };

        let mut out = read_headers(&parsed, diagnostics);

        for part in mime_parts(&parsed, diagnostics) {
            match part {
                PartKind::Inline(p) => match self.inline_text(p) {
                    // a later inline part replaces an earlier one
                    Ok(text) => out.body = text,
                    Err(e) => diagnostics.push(Stage::Part, format!("convert body: {e:#}")),
                },
                PartKind::Attachment(p) => match p.get_body_raw() {
                    Ok(bytes) => out.attachments.push(bytes),
                    Err(e) => diagnostics.push(Stage::Part, format!("read attachment: {e}")),
                },
            }
        }

        out
    }

    /// [`Normalizer::normalize`] plus the folder display rule.
    pub fn normalize_in_folder(
        &self,
        raw: &[u8],
        folder: &str,
        diagnostics: &mut Diagnostics,
    ) -> NormalizedMail {
        self.normalize(raw, diagnostics).with_folder(folder)
    }

    fn inline_text(&self, part: &ParsedMail) -> Result<String> {
        let mime = part.ctype.mimetype.to_ascii_lowercase();
        if mime == "text/html" {
            let html = part.get_body()?;
            html_to_text(&html, &self.html)
        } else if mime.starts_with("text/") {
            Ok(part.get_body()?)
        } else {
            bail!("unsupported inline content type {mime}")
        }
    }
}

fn read_headers(parsed: &ParsedMail, diagnostics: &mut Diagnostics) -> NormalizedMail {
    let h = &parsed.headers;
    let raw = |key: &str| h.get_first_header(key).map(|hdr| unfold(hdr.get_value_raw()));

    let mut out = NormalizedMail {
        from: raw("From").unwrap_or_default(),
        to: raw("To").unwrap_or_default(),
        cc: raw("Cc").unwrap_or_default(),
        ..Default::default()
    };

    if let Some(v) = raw("Message-ID") {
        match parse_message_id(&v) {
            Some(id) => out.id = id,
            None => diagnostics.push(Stage::Header, format!("invalid Message-ID {v:?}")),
        }
    }

    if let Some(v) = raw("Date") {
        out.date = match render_date(&v) {
            Some(d) => d,
            None => {
                diagnostics.push(Stage::Header, format!("invalid Date {v:?}"));
                v
            }
        };
    }

    if let Some(hdr) = h.get_first_header("Subject") {
        let value = hdr.get_value_raw();
        out.subject = match decode_subject(value) {
            Some(s) => s,
            None => {
                let v = unfold(value);
                diagnostics.push(Stage::Header, format!("undecodable Subject {v:?}"));
                v
            }
        };
    }

    out
}
