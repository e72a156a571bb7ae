//! Fetch every message of an IMAP mailbox and flatten each one into a
//! [`NormalizedMail`](domain::email::NormalizedMail) record for indexing.

pub mod config;
pub mod domain;
pub mod mail;
