//! Shared networking constants and helpers used by client and server.

/// TCP port of the server's command channel (client -> server).
pub const COMMAND_PORT: u16 = 8080;

/// Quote endpoint used when none is configured.
pub const DEFAULT_QUOTE_URL: &str = "http://127.0.0.1:8090/v1/quotes";

/// Upper bound on a single remote quote request.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Default period of the background refresh (one hour).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;

/// Default scheduling tolerance of the background refresh.
pub const DEFAULT_REFRESH_TOLERANCE_SECS: u64 = 10;

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

/// Extract `host:port` from an `http(s)://host[:port]/path` URL.
///
/// Used to derive a connectivity probe target from the quote endpoint. Returns
/// `None` when the URL has no recognizable host.
pub fn host_port(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;
    if authority.is_empty() {
        return None;
    }
    if authority.contains(':') && !authority.ends_with(']') {
        Some(authority.to_string())
    } else {
        Some(addr(authority, default_port))
    }
}
