// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Address normalisation for operator-entered print server locations.
//
// Operators type anything from "192.168.0.10" to "https://printer.local:9000/".
// This module turns that into a canonical origin (`scheme://host:port`) or,
// when the text cannot be parsed, keeps the trimmed text so the save still
// succeeds and the problem shows up later as a connectivity failure.

use reqwest::Url;
use tracing::debug;

use tillprint_core::types::{DEFAULT_PORT, PrintServerAddress, Scheme, ServerEndpoint};

/// Normalise operator input into a print server endpoint.
///
/// Returns `None` for blank input, meaning "use the default address".
/// Never fails: unparseable input comes back as [`ServerEndpoint::Unparsed`].
pub fn normalize(raw: &str) -> Option<ServerEndpoint> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        // The daemon runs unencrypted on the LAN.
        format!("http://{trimmed}")
    };

    if let Some(addr) = parse_origin(&candidate) {
        return Some(ServerEndpoint::Origin(addr));
    }

    let fallback = trimmed.trim_end_matches('/');
    // "http://" with nothing after it names no server at all, and stripping
    // its slashes would leave text that parses differently next time.
    if fallback.is_empty() || (has_scheme(trimmed) && !has_scheme(fallback)) {
        return None;
    }
    debug!(input = fallback, "print server address not parseable, keeping raw text");
    Some(ServerEndpoint::Unparsed(fallback.to_string()))
}

/// Normalise, substituting the built-in default for blank input.
pub fn normalize_or_default(raw: &str) -> ServerEndpoint {
    normalize(raw).unwrap_or_default()
}

/// True if `s` starts with `<scheme>://` where scheme follows RFC 3986
/// (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`).
fn has_scheme(s: &str) -> bool {
    let Some(idx) = s.find("://") else {
        return false;
    };
    let scheme = &s[..idx];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Reduce a URL to its origin, injecting the default daemon port.
///
/// Path, query, and fragment are dropped. Only `http`/`https` are accepted.
fn parse_origin(candidate: &str) -> Option<PrintServerAddress> {
    let url = Url::parse(candidate).ok()?;
    let scheme = Scheme::from_url_scheme(url.scheme())?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    // `Url::port` hides a port equal to the scheme default, so whether the
    // operator typed one is read from the authority text instead.
    let port = if has_explicit_port(candidate) {
        url.port_or_known_default().unwrap_or(DEFAULT_PORT)
    } else {
        DEFAULT_PORT
    };
    Some(PrintServerAddress::new(scheme, host, port))
}

/// True if the authority of `candidate` ends in `:<digits>`.
fn has_explicit_port(candidate: &str) -> bool {
    let rest = candidate
        .split_once("://")
        .map_or(candidate, |(_, rest)| rest.trim_start_matches(['/', '\\']));
    let authority = rest.split(['/', '\\', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    // Colons inside an IPv6 literal are not port separators.
    let after_host = host_port.rfind(']').map_or(host_port, |i| &host_port[i + 1..]);
    after_host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}
