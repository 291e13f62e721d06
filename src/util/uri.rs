//! Helpers to build and pick apart scheduler and node URIs.
//!
//! URIs have the shape `protocol://host[:port]/name`. Parsing goes through the
//! `url` crate so custom protocols such as `pnp` are handled like `http`.

use url::Url;

use crate::error::{Result, SchedulerError};

pub const DEFAULT_PROTOCOL: &str = "pnp";

fn invalid(uri: &str, reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.into(),
    }
}

/// Build `protocol://host[:port]/name`.
pub fn build_uri(host: &str, name: &str, protocol: &str, port: Option<u16>) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(invalid(name, "host must not be empty"));
    }
    let name = name.trim_start_matches('/');
    let raw = match port {
        Some(port) => format!("{protocol}://{host}:{port}/{name}"),
        None => format!("{protocol}://{host}/{name}"),
    };
    normalize(&raw, protocol)
}

/// Parse `raw`, adding `default_protocol` when no scheme is given and collapsing
/// repeated slashes in the path.
pub fn normalize(raw: &str, default_protocol: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw, "URI must not be empty"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{default_protocol}://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(raw, e.to_string()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(raw, "URI has no host"));
    }

    let collapsed = collapse_slashes(url.path());
    url.set_path(&collapsed);
    Ok(url)
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    if path.len() > 1 && path.ends_with('/') && !out.ends_with('/') {
        out.push('/');
    }
    out
}

pub fn host_of(url: &Url) -> Option<&str> {
    url.host_str()
}

/// The explicit port, or the scheme's well-known port.
pub fn port_of(url: &Url) -> Option<u16> {
    url.port_or_known_default()
}

pub fn protocol_of(url: &Url) -> &str {
    url.scheme()
}

/// The path without its surrounding slashes, e.g. `local-node-0`.
pub fn name_of(url: &Url) -> &str {
    url.path().trim_matches('/')
}

pub fn strip_protocol(raw: &str) -> &str {
    raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_uri_with_port() {
        let url = build_uri("localhost", "local-node-0", "pnp", Some(64738)).unwrap();
        assert_eq!(url.as_str(), "pnp://localhost:64738/local-node-0");
        assert_eq!(host_of(&url), Some("localhost"));
        assert_eq!(port_of(&url), Some(64738));
        assert_eq!(protocol_of(&url), "pnp");
        assert_eq!(name_of(&url), "local-node-0");
    }

    #[test]
    fn build_uri_without_port_uses_known_default() {
        let url = build_uri("example.org", "/scheduler", "http", None).unwrap();
        assert_eq!(url.as_str(), "http://example.org/scheduler");
        assert_eq!(port_of(&url), Some(80));
    }

    #[test]
    fn build_uri_rejects_empty_host() {
        assert!(build_uri("  ", "node", "pnp", None).is_err());
    }

    #[test]
    fn normalize_adds_default_protocol() {
        let url = normalize("grid.example.org:6000/rm", DEFAULT_PROTOCOL).unwrap();
        assert_eq!(protocol_of(&url), "pnp");
        assert_eq!(host_of(&url), Some("grid.example.org"));
        assert_eq!(port_of(&url), Some(6000));
        assert_eq!(name_of(&url), "rm");
    }

    #[test]
    fn normalize_collapses_repeated_slashes() {
        let url = normalize("http://host//a///b/", "pnp").unwrap();
        assert_eq!(url.path(), "/a/b/");
        let url = normalize("http://host", "pnp").unwrap();
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize("", "pnp").is_err());
        assert!(normalize("http://", "pnp").is_err());
        assert!(normalize("http://exa mple.org/", "pnp").is_err());
    }

    #[test]
    fn strip_protocol_only_removes_scheme() {
        assert_eq!(strip_protocol("pnp://host:1/x"), "host:1/x");
        assert_eq!(strip_protocol("host:1/x"), "host:1/x");
    }
}
