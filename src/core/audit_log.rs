//! Hash-chained audit trail of keyring and purge operations.
//!
//! One JSON object per line. Each entry stores the hash of its predecessor
//! and a SHA-256 over its own canonical JSON, so edits and deletions in the
//! middle of the log are detectable. Entries never contain key material.

use crate::constants;
use crate::util::fs as node_fs;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    /// Role name for keyring actions, `node` for purge.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

/// What happened, before timestamps and hashes are attached.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub subject: String,
    pub cluster: Option<String>,
    pub target_path: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(action: &str, subject: &str) -> Self {
        Self {
            action: action.to_string(),
            subject: subject.to_string(),
            cluster: None,
            target_path: None,
            error: None,
        }
    }

    pub fn cluster(mut self, cluster: Option<&str>) -> Self {
        self.cluster = cluster.map(str::to_string);
        self
    }

    pub fn target(mut self, path: &Path) -> Self {
        self.target_path = Some(path.display().to_string());
        self
    }

    pub fn failed(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

/// Append `event` to the log at `path`. Callers hold the node lock.
pub fn record(path: &Path, event: AuditEvent) -> Result<()> {
    record_as(path, event, &detect_actor())
}

pub fn record_as(path: &Path, event: AuditEvent, actor: &str) -> Result<()> {
    let prev_hash = last_entry_hash(path)?;
    let mut entry = AuditEntry {
        timestamp: Utc::now(),
        action: event.action,
        actor: actor.to_string(),
        subject: event.subject,
        cluster: event.cluster,
        target_path: event.target_path,
        success: event.error.is_none(),
        error: event.error,
        prev_hash,
        entry_hash: None,
    };
    entry.entry_hash = Some(entry_hash(&entry)?);
    let line = serde_json::to_string(&entry).context("serialize audit entry")?;

    node_fs::ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {}", path.display()))?;
    writeln!(file, "{}", line).context("write audit entry")?;
    node_fs::set_permissions(path, constants::AUDIT_LOG_MODE)?;
    Ok(())
}

/// SHA-256 over the entry's JSON with `entry_hash` removed and keys sorted.
fn entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    // serde_json::Map is a BTreeMap without `preserve_order`, so keys are sorted
    let canonical = serde_json::to_string(&value).context("serialize canonical json")?;
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

fn last_entry_hash(path: &Path) -> Result<Option<String>> {
    Ok(read_log(path, Some(1))?
        .pop()
        .and_then(|entry| entry.entry_hash))
}

/// Read entries, keeping the last `limit` when given. Malformed lines are
/// skipped with a warning.
pub fn read_log(path: &Path, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)
        .with_context(|| format!("open audit log {}", path.display()))?;
    let mut entries = Vec::new();
    let mut malformed = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.context("read audit log line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        warn!("{} malformed audit entries skipped", malformed);
    }
    if let Some(limit) = limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }
    Ok(entries)
}

/// Check hashes and links. Returns (entries checked, problems found).
pub fn verify_chain(path: &Path) -> Result<(usize, Vec<String>)> {
    let entries = read_log(path, None)?;
    let mut errors = Vec::new();
    let mut prev: Option<&str> = None;
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.prev_hash.as_deref() != prev {
            errors.push(format!("entry {}: prev_hash does not match entry {}", i + 1, i));
        }
        match &entry.entry_hash {
            Some(stored) => {
                if &entry_hash(entry)? != stored {
                    errors.push(format!("entry {}: entry_hash mismatch (modified?)", i + 1));
                }
            }
            None => errors.push(format!("entry {}: missing entry_hash", i + 1)),
        }
        prev = entry.entry_hash.as_deref();
    }
    Ok((entries.len(), errors))
}
