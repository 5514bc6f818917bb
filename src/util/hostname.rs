//! Local host name lookup.

use tracing::warn;

/// Short host name of this node (domain part stripped), if it can be read.
pub fn short_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => {
            let name = name.to_string_lossy();
            short(&name)
        }
        Err(e) => {
            warn!("cannot read host name: {}", e);
            None
        }
    }
}

fn short(name: &str) -> Option<String> {
    let short = name.split('.').next().unwrap_or("").trim();
    if short.is_empty() {
        None
    } else {
        Some(short.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_strips_domain() {
        assert_eq!(short("node1.example.com"), Some("node1".to_string()));
        assert_eq!(short("node1"), Some("node1".to_string()));
        assert_eq!(short(""), None);
    }
}
