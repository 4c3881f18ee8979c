//! Endpoint URL normalization.
//!
//! Callers hand the stream loose addresses such as `example.com`, `/`,
//! `https://host:3000` or the shorthand `ddp+sockjs://` schemes. Before every
//! connection attempt the raw address is turned into a fully-qualified
//! transport URL.
//!
//! The `ddp+sockjs://` and `ddpi+sockjs://` schemes may carry `*` wildcards in
//! the host. Each wildcard becomes a random digit on every call, so repeated
//! reconnects spread over several hostnames and dodge per-host connection
//! limits. Output for those inputs differs between calls.

use crate::options::SiteConfig;
use rand::Rng;

const SECURE_DDP_SCHEME: &str = "ddp+sockjs://";
const INSECURE_DDP_SCHEME: &str = "ddpi+sockjs://";

/// Normalize a raw address into a SockJS endpoint URL (`http(s)://…/sockjs`).
pub fn to_sockjs_url(raw: &str, site: &SiteConfig) -> String {
    translate_url(raw, "http", "sockjs", site)
}

/// Normalize a raw address into a raw websocket endpoint URL (`ws(s)://…/websocket`).
pub fn to_websocket_url(raw: &str, site: &SiteConfig) -> String {
    translate_url(raw, "ws", "websocket", site)
}

fn translate_url(raw: &str, scheme_base: &str, sub_path: &str, site: &SiteConfig) -> String {
    if let Some((after, secure)) = strip_ddp_scheme(raw) {
        let scheme = if secure {
            format!("{}s", scheme_base)
        } else {
            scheme_base.to_string()
        };

        let (host, rest) = match after.find('/') {
            Some(pos) => after.split_at(pos),
            None => (after, ""),
        };

        return format!("{}://{}{}", scheme, expand_wildcards(host), rest);
    }

    let mut url = if let Some(after) = raw.strip_prefix("http://") {
        format!("{}://{}", scheme_base, after)
    } else if let Some(after) = raw.strip_prefix("https://") {
        format!("{}s://{}", scheme_base, after)
    } else {
        raw.to_string()
    };

    // Bare hosts get a scheme; root-relative paths stay relative.
    if !url.contains("://") && !url.starts_with('/') {
        url = format!("{}://{}", scheme_base, url);
    }

    let mut url = site.relative_to_site_root(&url);
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(sub_path);
    url
}

fn strip_ddp_scheme(raw: &str) -> Option<(&str, bool)> {
    if let Some(after) = raw.strip_prefix(SECURE_DDP_SCHEME) {
        Some((after, true))
    } else {
        raw.strip_prefix(INSECURE_DDP_SCHEME)
            .map(|after| (after, false))
    }
}

fn expand_wildcards(host: &str) -> String {
    let mut rng = rand::thread_rng();
    host.chars()
        .map(|c| {
            if c == '*' {
                char::from(b'0' + rng.gen_range(0..10u8))
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig::default()
    }

    /// Checks `actual` against `prefix`, then `digits` ASCII digits, then `suffix`.
    fn matches_wildcard(actual: &str, prefix: &str, digits: usize, suffix: &str) -> bool {
        let Some(rest) = actual.strip_prefix(prefix) else {
            return false;
        };
        let Some(middle) = rest.strip_suffix(suffix) else {
            return false;
        };
        middle.len() == digits && middle.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn test_canonical_forms() {
        let cases = [
            ("http://subdomain.meteor.com/", "http://subdomain.meteor.com/sockjs"),
            ("http://subdomain.meteor.com", "http://subdomain.meteor.com/sockjs"),
            ("subdomain.meteor.com/", "http://subdomain.meteor.com/sockjs"),
            ("subdomain.meteor.com", "http://subdomain.meteor.com/sockjs"),
            ("http://localhost:3000/", "http://localhost:3000/sockjs"),
            ("http://localhost:3000", "http://localhost:3000/sockjs"),
            ("localhost:3000", "http://localhost:3000/sockjs"),
            ("https://subdomain.meteor.com/", "https://subdomain.meteor.com/sockjs"),
            ("https://subdomain.meteor.com", "https://subdomain.meteor.com/sockjs"),
            ("example.com", "http://example.com/sockjs"),
        ];

        for (raw, expected) in cases {
            assert_eq!(to_sockjs_url(raw, &site()), expected, "input: {}", raw);
        }
    }

    #[test]
    fn test_root_relative_uses_site_root() {
        assert_eq!(to_sockjs_url("/", &site()), site().relative_to_site_root("/sockjs"));

        let mounted = SiteConfig {
            origin: Some("https://app.example.com".to_string()),
            root_url_path_prefix: "/chat".to_string(),
            server_id: None,
        };
        assert_eq!(
            to_sockjs_url("/", &mounted),
            "https://app.example.com/chat/sockjs"
        );
        assert_eq!(
            to_sockjs_url("/custom", &mounted),
            "https://app.example.com/chat/custom/sockjs"
        );
    }

    #[test]
    fn test_wildcard_schemes_match_pattern() {
        for _ in 0..20 {
            let secure = to_sockjs_url("ddp+sockjs://ddp--****-foo.meteor.com/sockjs", &site());
            assert!(
                matches_wildcard(&secure, "https://ddp--", 4, "-foo.meteor.com/sockjs"),
                "{}",
                secure
            );

            let insecure =
                to_sockjs_url("ddpi+sockjs://ddp--****-foo.meteor.com/sockjs", &site());
            assert!(
                matches_wildcard(&insecure, "http://ddp--", 4, "-foo.meteor.com/sockjs"),
                "{}",
                insecure
            );
        }
    }

    #[test]
    fn test_wildcard_output_varies() {
        let raw = "ddp+sockjs://ddp--********-foo.meteor.com/sockjs";
        let outputs: std::collections::HashSet<String> =
            (0..10).map(|_| to_sockjs_url(raw, &site())).collect();
        // 10^8 possible hosts; ten identical draws would be astronomically unlikely.
        assert!(outputs.len() > 1);
    }

    #[test]
    fn test_wildcard_without_path() {
        let url = to_sockjs_url("ddpi+sockjs://host-*.example.com", &site());
        assert!(matches_wildcard(&url, "http://host-", 1, ".example.com"), "{}", url);
    }

    #[test]
    fn test_websocket_variant() {
        assert_eq!(
            to_websocket_url("https://example.com", &site()),
            "wss://example.com/websocket"
        );
        assert_eq!(
            to_websocket_url("localhost:3000", &site()),
            "ws://localhost:3000/websocket"
        );
    }
}
