//! Keyring text format and raw file access.
//!
//! A keyring is a bracketed principal header followed by tab-indented
//! `key = <base64>` and `caps <subsystem> = "<permission>"` lines:
//!
//! ```text
//! [client.admin]
//! 	key = AQA/vZ9WyDwsKRAAxQ6wjGJH6WV8fDJeyzxHrg==
//! 	caps mon = "allow *"
//! ```
//!
//! This module never decides whether a write is allowed; the lifecycle
//! manager does.

use crate::error::{Error, IoContext, Result};
use crate::util::fs as node_fs;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Decoded form of one keyring section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringStanza {
    pub principal: String,
    pub key: Option<String>,
    pub caps: BTreeMap<String, String>,
}

/// Render a stanza. Without a secret no `key` line is emitted.
pub fn encode(principal: &str, capabilities: &[(&str, &str)], secret: Option<&str>) -> String {
    let mut out = format!("[{}]\n", principal);
    if let Some(secret) = secret {
        out.push_str(&format!("\tkey = {}\n", secret));
    }
    for (subsystem, permission) in capabilities {
        out.push_str(&format!("\tcaps {} = \"{}\"\n", subsystem, permission));
    }
    out
}

/// Parse the first section of `text`. Lines other than `key` and `caps`
/// are ignored; a later section header ends the parse.
pub fn decode(text: &str) -> Result<KeyringStanza> {
    let mut stanza: Option<KeyringStanza> = None;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            if stanza.is_some() {
                break;
            }
            let principal = header
                .strip_suffix(']')
                .ok_or_else(|| Error::Malformed(format!("unterminated header '{}'", line)))?;
            stanza = Some(KeyringStanza {
                principal: principal.to_string(),
                key: None,
                caps: BTreeMap::new(),
            });
            continue;
        }
        let current = stanza
            .as_mut()
            .ok_or_else(|| Error::Malformed("entry before section header".to_string()))?;
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name == "key" {
            current.key = Some(value.to_string());
        } else if let Some(subsystem) = name.strip_prefix("caps ") {
            current
                .caps
                .insert(subsystem.trim().to_string(), unquote(value).to_string());
        }
    }
    stanza.ok_or_else(|| Error::Malformed("no section header".to_string()))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Normalize caller-supplied text to the on-disk layout: blank lines
/// dropped, headers flush left, every other line indented by one tab.
pub fn format_stanza(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if stripped.starts_with('[') {
            out.push_str(stripped);
        } else {
            out.push('\t');
            out.push_str(stripped);
        }
        out.push('\n');
    }
    out
}

/// Write `text` to `path`, creating parent directories as needed.
/// Always overwrites.
pub fn write(path: &Path, text: &str) -> Result<()> {
    node_fs::ensure_parent(path)?;
    fs::write(path, format_stanza(text))
        .io_context(|| format!("write keyring {}", path.display()))
}

pub fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).io_context(|| format!("read keyring {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = "AQA/vZ9WyDwsKRAAxQ6wjGJH6WV8fDJeyzxHrg==";

    #[test]
    fn test_encode_layout() {
        let text = encode("mon.", &[("mon", "allow *")], Some(SECRET));
        assert_eq!(
            text,
            format!("[mon.]\n\tkey = {}\n\tcaps mon = \"allow *\"\n", SECRET)
        );
    }

    #[test]
    fn test_encode_without_secret_has_no_key_line() {
        let text = encode(
            "client.bootstrap-osd",
            &[("mon", "allow profile bootstrap-osd")],
            None,
        );
        assert!(!text.contains("key ="));
        assert!(text.starts_with("[client.bootstrap-osd]\n"));
    }

    #[test]
    fn test_decode_admin_stanza() {
        let caps = [("mon", "allow *"), ("osd", "allow *"), ("mds", "allow *")];
        let stanza = decode(&encode("client.admin", &caps, Some(SECRET))).unwrap();
        assert_eq!(stanza.principal, "client.admin");
        assert_eq!(stanza.key.as_deref(), Some(SECRET));
        let expected: BTreeMap<String, String> = caps
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(stanza.caps, expected);
    }

    #[test]
    fn test_decode_stops_at_second_section() {
        let text = "[mon.]\n\tkey = A==\n[client.admin]\n\tkey = B==\n";
        let stanza = decode(text).unwrap();
        assert_eq!(stanza.principal, "mon.");
        assert_eq!(stanza.key.as_deref(), Some("A=="));
    }

    #[test]
    fn test_decode_rejects_missing_header() {
        assert!(matches!(decode("key = A==\n"), Err(Error::Malformed(_))));
        assert!(matches!(decode(""), Err(Error::Malformed(_))));
        assert!(matches!(decode("[mon.\n"), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_format_stanza_reindents_and_drops_blanks() {
        let input = "  [mds.]\n\n   key = A==  \n\n caps mds = \"allow *\"\n";
        assert_eq!(
            format_stanza(input),
            "[mds.]\n\tkey = A==\n\tcaps mds = \"allow *\"\n"
        );
    }

    #[test]
    fn test_write_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootstrap-osd/ceph.keyring");
        write(&path, "[a]\nkey = 1\n").unwrap();
        write(&path, "[b]\nkey = 2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[b]\n\tkey = 2\n");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.keyring");
        assert!(matches!(read(&path), Err(Error::NotFound(p)) if p == path));
    }
}
