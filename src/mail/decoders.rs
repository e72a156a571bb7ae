use chrono::{DateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Raw header bytes as a single line of text.
///
/// A line break and the whitespace after it become one space.
pub fn unfold(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut folding = false;
    for c in text.chars() {
        match c {
            '\r' | '\n' => folding = true,
            ' ' | '\t' if folding => {}
            _ => {
                if folding {
                    out.push(' ');
                    folding = false;
                }
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}

/// Decode RFC 2047 encoded-words in a subject.
///
/// Returns `None` when the header cannot be parsed or an encoded-word survives
/// decoding (unknown charset, broken payload); callers keep the raw text then.
pub fn decode_subject(raw: &[u8]) -> Option<String> {
    // mailparse expects a full "Key: value" header line
    let mut line = b"Subject: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    let (h, _idx) = mailparse::parse_header(&line).ok()?;
    let decoded = h.get_value();
    // mailparse copies words it cannot decode into the output unchanged
    let raw = String::from_utf8_lossy(raw);
    if encoded_words(&raw).iter().any(|w| decoded.contains(*w)) {
        return None;
    }
    Some(decoded.trim().to_string())
}

/// `=?charset?encoding?text?=` tokens in `s`, in order.
fn encoded_words(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("=?") {
        let tail = &rest[start + 2..];
        match encoded_word_len(tail) {
            Some(len) => {
                out.push(&rest[start..start + 2 + len]);
                rest = &tail[len..];
            }
            None => rest = tail,
        }
    }
    out
}

// length of `charset?B?text?=` at the start of `tail`
fn encoded_word_len(tail: &str) -> Option<usize> {
    let q1 = tail.find('?')?;
    let charset = &tail[..q1];
    let encoding = tail.get(q1 + 1..q1 + 2)?;
    if tail.get(q1 + 2..q1 + 3)? != "?" {
        return None;
    }
    let text_start = q1 + 3;
    let text_end = text_start + tail[text_start..].find("?=")?;

    let valid = !charset.is_empty()
        && !charset.contains(|c: char| c.is_whitespace() || c == '=')
        && matches!(encoding, "B" | "b" | "Q" | "q")
        && !tail[text_start..text_end].contains(char::is_whitespace);
    valid.then_some(text_end + 2)
}

/// The id inside `<...>` of a Message-ID header.
pub fn parse_message_id(raw: &str) -> Option<String> {
    let rest = raw.trim().strip_prefix('<')?;
    let end = rest.find('>')?;
    let id = &rest[..end];
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return None;
    }
    Some(id.to_string())
}

/// Render a Date header as `YYYY-MM-DD HH:MM:SS +ZZZZ`.
///
/// Strict RFC 2822 keeps the sender's offset; the lenient mailparse parser is
/// tried next and renders in UTC.
pub fn render_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(d) = DateTime::parse_from_rfc2822(raw) {
        return Some(d.format(DATE_FORMAT).to_string());
    }
    // no day or year to find; keep such text away from the lenient parser
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let epoch = mailparse::dateparse(raw).ok()?;
    let d: DateTime<Utc> = DateTime::from_timestamp(epoch, 0)?;
    Some(d.format(DATE_FORMAT).to_string())
}
