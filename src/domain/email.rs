use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical IMAP name of the inbox and the label shown to users instead.
const INBOX: &str = "INBOX";
const INBOX_LABEL: &str = "Inbox";

/// One fetched message flattened for indexing.
///
/// Every field falls back to its empty value when the matching header or part
/// could not be decoded, so a record is always produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMail {
    pub id: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub body: String,
    pub date: String,
    pub folder: String,
    #[serde(
        serialize_with = "serialize_blobs",
        deserialize_with = "deserialize_blobs",
        default
    )]
    pub attachments: Vec<Vec<u8>>,
}

impl NormalizedMail {
    /// Set the owning folder, mapping `INBOX` to its display label.
    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folder = display_folder_name(folder);
        self
    }
}

/// `INBOX` is shown as `Inbox`; every other mailbox name passes through.
pub fn display_folder_name(name: &str) -> String {
    if name == INBOX {
        INBOX_LABEL.to_string()
    } else {
        name.to_string()
    }
}

impl fmt::Display for NormalizedMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id: {}", self.id)?;
        writeln!(f, "folder: {}", self.folder)?;
        writeln!(f, "date: {}", self.date)?;
        writeln!(f, "from: {}", self.from)?;
        writeln!(f, "to: {}", self.to)?;
        writeln!(f, "cc: {}", self.cc)?;
        writeln!(f, "subject: {}", self.subject)?;
        writeln!(f)?;
        writeln!(f, "{}", self.body)
    }
}

// attachments travel as base64 strings in JSON
fn serialize_blobs<S: Serializer>(blobs: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
    let encoded: Vec<String> = blobs
        .iter()
        .map(|b| general_purpose::STANDARD.encode(b))
        .collect();
    encoded.serialize(s)
}

fn deserialize_blobs<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
    let encoded = Vec::<String>::deserialize(d)?;
    encoded
        .iter()
        .map(|s| {
            general_purpose::STANDARD
                .decode(s)
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_gets_display_label() {
        assert_eq!(display_folder_name("INBOX"), "Inbox");
    }

    #[test]
    fn other_folders_pass_through() {
        assert_eq!(display_folder_name("Archive"), "Archive");
        assert_eq!(display_folder_name("inbox"), "inbox");
        assert_eq!(display_folder_name("INBOX/Work"), "INBOX/Work");
    }

    #[test]
    fn with_folder_applies_label() {
        let m = NormalizedMail::default().with_folder("INBOX");
        assert_eq!(m.folder, "Inbox");
    }

    #[test]
    fn json_uses_lowercase_keys_and_base64_attachments() {
        let m = NormalizedMail {
            id: "abc@example.com".into(),
            subject: "Hi".into(),
            attachments: vec![b"hello".to_vec()],
            ..Default::default()
        };
        let v: serde_json::Value = serde_json::to_value(&m).unwrap();
        assert_eq!(v["id"], "abc@example.com");
        assert_eq!(v["subject"], "Hi");
        assert_eq!(v["attachments"][0], "aGVsbG8=");

        let back: NormalizedMail = serde_json::from_value(v).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn display_lists_headers_then_body() {
        let m = NormalizedMail {
            id: "1@x".into(),
            folder: "Inbox".into(),
            subject: "Report".into(),
            body: "numbers".into(),
            ..Default::default()
        };
        let s = m.to_string();
        assert!(s.starts_with("id: 1@x\nfolder: Inbox\n"));
        assert!(s.contains("subject: Report\n\nnumbers\n"));
    }
}
