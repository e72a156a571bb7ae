use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use rs_mail_indexer::config::{Config, load_config, load_config_from};
use rs_mail_indexer::mail::imap_client::ImapClient;

#[derive(Parser)]
#[command(name = "rs_mail_indexer")]
#[command(about = "Fetch an IMAP mailbox as normalized records", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every message of the mailbox and print it
    Fetch {
        /// Mailbox to read (overrides config)
        #[arg(long)]
        mailbox: Option<String>,

        /// One JSON object per line instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Print the message count of the mailbox
    Info {
        #[arg(long)]
        mailbox: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    match cli.cmd {
        Command::Fetch { mailbox, json } => {
            let mailbox = mailbox.unwrap_or_else(|| cfg.mailbox.clone());
            with_client(&cfg, |imap| {
                imap.select_mailbox(&mailbox)?;
                for mail in imap.fetch_all()? {
                    if json {
                        println!("{}", serde_json::to_string(&mail)?);
                    } else {
                        println!("{mail}");
                    }
                }
                Ok(())
            })
        }

        Command::Info { mailbox } => {
            let mailbox = mailbox.unwrap_or_else(|| cfg.mailbox.clone());
            with_client(&cfg, |imap| {
                let info = imap.select_mailbox(&mailbox)?;
                println!("{}: {} messages", info.name, info.messages);
                Ok(())
            })
        }
    }
}

/// Connect, run `f`, and always try to log out afterwards.
fn with_client(cfg: &Config, f: impl FnOnce(&mut ImapClient) -> Result<()>) -> Result<()> {
    let mut imap = ImapClient::new(cfg.server_settings()?);
    imap.connect()?;

    let res = f(&mut imap);
    if let Err(e) = imap.disconnect() {
        log::warn!("logout: {e}");
    }
    res
}
