use crate::error::ProxyError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Parse and validate a user-supplied `url` query parameter.
///
/// Accepts only absolute `http://` and `https://` URLs with a host. When
/// `block_private` is set, IP literals in private or reserved ranges are
/// rejected too (SSRF protection). Hostnames are accepted without DNS
/// resolution, so DNS rebinding is not covered.
///
/// # Errors
/// Returns [`ProxyError::InvalidTarget`] for:
/// - A missing or empty parameter
/// - Invalid or relative URLs
/// - Non-HTTP(S) schemes
/// - Blocked IPv4/IPv6 literals (only with `block_private`)
pub fn parse_target(raw: Option<&str>, block_private: bool) -> Result<Url, ProxyError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProxyError::InvalidTarget("Missing url parameter".to_string()))?;

    let parsed =
        Url::parse(raw).map_err(|_| ProxyError::InvalidTarget(format!("Invalid URL: {raw}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::InvalidTarget(format!(
                "Scheme '{scheme}' not allowed, only http/https permitted"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| ProxyError::InvalidTarget(format!("No host in URL: {raw}")))?;

    if block_private {
        match host {
            Host::Ipv4(ip) if is_blocked_ipv4(ip) => {
                return Err(ProxyError::InvalidTarget(format!(
                    "Private or reserved IPv4 address not allowed: {ip}"
                )));
            }
            Host::Ipv6(ip) if ip.to_ipv4_mapped().is_some_and(is_blocked_ipv4) => {
                return Err(ProxyError::InvalidTarget(format!(
                    "Private or reserved IPv4-mapped address not allowed: {ip}"
                )));
            }
            Host::Ipv6(ip) if is_blocked_ipv6(ip) => {
                return Err(ProxyError::InvalidTarget(format!(
                    "Private or reserved IPv6 address not allowed: {ip}"
                )));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

/// `true` for 0/8, RFC 1918, loopback, link-local (cloud metadata), 100.64/10,
/// multicast and broadcast.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();

    a == 0
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || (a == 100 && (64..=127).contains(&b))
}

/// `true` for ::, ::1, fe80::/10 and fc00::/7.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback()
        || ip.is_unspecified()
        || (s[0] & 0xffc0) == 0xfe80
        || (s[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(url: &str) -> bool {
        parse_target(Some(url), true).is_err()
    }

    // --- Presence and syntax ---

    #[test]
    fn missing_parameter_is_invalid() {
        assert!(matches!(
            parse_target(None, false),
            Err(ProxyError::InvalidTarget(_))
        ));
        assert!(parse_target(Some(""), false).is_err());
        assert!(parse_target(Some("   "), false).is_err());
    }

    #[test]
    fn relative_or_garbage_is_invalid() {
        assert!(parse_target(Some("segment1.ts"), false).is_err());
        assert!(parse_target(Some("cdn.example.com/stream"), false).is_err());
        assert!(parse_target(Some("://missing-scheme"), false).is_err());
    }

    #[test]
    fn non_http_schemes_are_invalid() {
        assert!(parse_target(Some("ftp://cdn.example.com/file.ts"), false).is_err());
        assert!(parse_target(Some("file:///etc/passwd"), false).is_err());
        assert!(parse_target(Some("data:text/plain,hello"), false).is_err());
    }

    #[test]
    fn query_string_is_kept() {
        let url = parse_target(Some("https://cdn.example.com/live.m3u8?token=abc&x=1"), true)
            .unwrap();
        assert_eq!(url.query(), Some("token=abc&x=1"));
    }

    // --- Private ranges ---

    #[test]
    fn rejects_private_ipv4_when_blocking() {
        assert!(blocked("http://127.0.0.1/stream"));
        assert!(blocked("http://10.1.2.3/stream"));
        assert!(blocked("http://172.16.0.1/stream"));
        assert!(blocked("http://192.168.1.1/stream"));
        assert!(blocked("http://169.254.169.254/latest/meta-data/"));
        assert!(blocked("http://0.0.0.0/stream"));
        assert!(blocked("http://100.64.0.1/stream"));
        assert!(blocked("http://255.255.255.255/stream"));
        assert!(blocked("http://224.0.0.1/stream"));
        assert!(blocked("http://239.255.255.250/stream"));
    }

    #[test]
    fn rejects_private_ipv6_when_blocking() {
        assert!(blocked("http://[::1]/stream"));
        assert!(blocked("http://[fe80::1]/stream"));
        assert!(blocked("http://[fd00::1]/stream"));
    }

    #[test]
    fn rejects_ipv4_mapped_private_addresses() {
        assert!(blocked("http://[::ffff:127.0.0.1]/stream"));
        assert!(blocked("http://[::ffff:169.254.169.254]/latest/meta-data/"));
        assert!(blocked("http://[::ffff:10.0.0.1]/stream"));
        assert!(!blocked("http://[::ffff:1.2.3.4]/stream"));
    }

    #[test]
    fn allows_private_targets_when_not_blocking() {
        assert!(parse_target(Some("http://127.0.0.1:8080/live.m3u8"), false).is_ok());
        assert!(parse_target(Some("http://[::1]/live.m3u8"), false).is_ok());
    }

    #[test]
    fn allows_public_hosts() {
        assert!(!blocked("https://cdn.example.com/stream.m3u8"));
        assert!(!blocked("http://1.2.3.4/stream"));
        assert!(!blocked("http://172.15.255.255/stream"));
        assert!(!blocked("http://172.32.0.0/stream"));
        assert!(!blocked("http://[2001:db8::1]/stream"));
    }
}
