use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::mail::imap_client::ServerSettings;

const PASSWORD_ENV: &str = "MAIL_INDEXER_PASSWORD";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host:port` of the IMAP server
    pub imap_server: String,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub tls_skip_verify: bool,
    pub username: String,
    pub password: Option<String>,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

fn default_true() -> bool {
    true
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

impl Config {
    /// Connection settings; the password falls back to `MAIL_INDEXER_PASSWORD`.
    pub fn server_settings(&self) -> Result<ServerSettings> {
        let password = self
            .password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .ok_or_else(|| anyhow!("password not set in config or {PASSWORD_ENV}"))?;

        Ok(ServerSettings {
            address: self.imap_server.clone(),
            tls: self.tls,
            tls_skip_verify: self.tls_skip_verify,
            username: self.username.clone(),
            password,
        })
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_indexer"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Load `path`, writing a template there first if it does not exist.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            imap_server: "imap.example.com:993".to_string(),
            tls: true,
            tls_skip_verify: false,
            username: "you@example.com".to_string(),
            password: None,
            mailbox: default_mailbox(),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} - edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
