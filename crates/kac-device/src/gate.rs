//! Presence gate: a second factor that must be presented before any fetch

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::allowlist::TagAllowList;

/// Principal reported for tokens that are not on the allow-list
pub const UNKNOWN_PRINCIPAL: &str = "Unknown";

/// Outcome of one presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub authorized: bool,
    pub principal: String,
}

impl Presentation {
    pub fn granted(principal: impl Into<String>) -> Self {
        Self {
            authorized: true,
            principal: principal.into(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            authorized: false,
            principal: UNKNOWN_PRINCIPAL.to_string(),
        }
    }
}

#[async_trait]
pub trait PresenceGate: Send + Sync {
    /// Block until a token is presented and resolved.
    ///
    /// Unbounded on its own; callers wrap it in a timeout. An `Err` means
    /// the gate could not be operated at all, not that access was refused.
    async fn wait_for_presentation(&self) -> Result<Presentation>;
}

/// Token UIDs read from the input on a dedicated thread.
///
/// The thread starts on the first wait and outlives any single wait, so a
/// wait that is cancelled by its caller's timeout leaves the next token
/// for the next wait.
struct TokenFeed {
    reader: Option<Box<dyn BufRead + Send>>,
    uids: Option<mpsc::UnboundedReceiver<std::io::Result<String>>>,
}

impl TokenFeed {
    fn uids(&mut self) -> &mut mpsc::UnboundedReceiver<std::io::Result<String>> {
        if let Some(reader) = self.reader.take() {
            let (tx, rx) = mpsc::unbounded_channel();
            std::thread::spawn(move || read_uids(reader, tx));
            self.uids = Some(rx);
        }
        self.uids.get_or_insert_with(|| mpsc::unbounded_channel().1)
    }
}

/// Forward non-blank trimmed lines; stops at EOF or the first read error.
fn read_uids(mut reader: Box<dyn BufRead + Send>, tx: mpsc::UnboundedSender<std::io::Result<String>>) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                let uid = line.trim();
                if !uid.is_empty() && tx.send(Ok(uid.to_string())).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

/// Reads token UIDs line by line (stdin by default) and resolves them
/// against the allow-list, which is reloaded on every wait.
pub struct ConsoleGate {
    allowlist: PathBuf,
    status: Vec<String>,
    feed: Mutex<TokenFeed>,
}

impl ConsoleGate {
    pub fn new(allowlist: impl Into<PathBuf>) -> Self {
        Self::with_input(allowlist, std::io::BufReader::new(std::io::stdin()))
    }

    pub fn with_input(allowlist: impl Into<PathBuf>, input: impl BufRead + Send + 'static) -> Self {
        Self {
            allowlist: allowlist.into(),
            status: Vec::new(),
            feed: Mutex::new(TokenFeed {
                reader: Some(Box::new(input)),
                uids: None,
            }),
        }
    }

    /// Extra lines shown above the prompt (environment readings).
    pub fn with_status(mut self, lines: Vec<String>) -> Self {
        self.status = lines;
        self
    }

    fn prompt_lines(&self) -> Vec<String> {
        self.status
            .iter()
            .cloned()
            .chain(
                ["Security Verification", "Tap the card...", "Waiting..."]
                    .into_iter()
                    .map(String::from),
            )
            .take(4)
            .collect()
    }

    fn load_allowlist(&self) -> TagAllowList {
        TagAllowList::load(&self.allowlist).unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{e:#}"), "tag allow-list unreadable, treating as empty");
            TagAllowList::default()
        })
    }
}

#[async_trait]
impl PresenceGate for ConsoleGate {
    async fn wait_for_presentation(&self) -> Result<Presentation> {
        let allowlist = self.load_allowlist();
        for line in self.prompt_lines() {
            eprintln!("{line}");
        }

        let mut feed = self.feed.lock().await;
        let uid = match feed.uids().recv().await {
            Some(uid) => uid.context("reading token UID")?,
            None => anyhow::bail!("token reader closed before a token was presented"),
        };
        drop(feed);

        match allowlist.resolve(&uid) {
            Some(name) => {
                tracing::info!(principal = %name, "token accepted");
                Ok(Presentation::granted(name))
            }
            None => {
                tracing::warn!(uid = %uid, "token not on allow-list");
                Ok(Presentation::unknown())
            }
        }
    }
}
