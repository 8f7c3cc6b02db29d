//! Presence-token allow-list: `{"<uid>": "<principal name>"}`

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Token UIDs enrolled on this device and the principals they resolve to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagAllowList {
    tags: BTreeMap<String, String>,
}

impl TagAllowList {
    /// Load the allow-list from a JSON file; a missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading tag allow-list: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing tag allow-list: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir: {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self).context("serializing tag allow-list")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing tag allow-list: {}", path.display()))
    }

    /// Bind `uid` to `name`. An existing binding is only replaced with `force`.
    pub fn enroll(&mut self, uid: &str, name: &str, force: bool) -> Result<()> {
        let uid = normalize(uid);
        if uid.is_empty() {
            anyhow::bail!("token UID must not be empty");
        }
        if let Some(existing) = self.tags.get(&uid) {
            if !force {
                anyhow::bail!("UID {uid} already enrolled for '{existing}' (use --force to overwrite)");
            }
        }
        self.tags.insert(uid, name.to_string());
        Ok(())
    }

    /// Remove a binding; returns whether it existed.
    pub fn remove(&mut self, uid: &str) -> bool {
        self.tags.remove(&normalize(uid)).is_some()
    }

    /// Principal name for a presented UID.
    pub fn resolve(&self, uid: &str) -> Option<&str> {
        self.tags.get(&normalize(uid)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

fn normalize(uid: &str) -> String {
    uid.trim().to_string()
}
