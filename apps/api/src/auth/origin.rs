//! Runtime origin derivation for redirect construction.
//!
//! OAuth redirect targets must point back at whatever host the service is
//! actually reachable on, which behind a proxy is only knowable from
//! request headers. Fallback order: configured public base URL, forwarded
//! headers, plain `Host` header, localhost.

use axum::http::HeaderMap;
use url::Url;

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Derives the externally visible origin of the current request.
pub fn derive_origin(headers: &HeaderMap, public_base_url: Option<&str>) -> Url {
    if let Some(configured) = public_base_url {
        if let Ok(url) = Url::parse(configured) {
            return url;
        }
    }

    let forwarded_host = header_str(headers, "x-forwarded-host");
    let host = forwarded_host.or_else(|| header_str(headers, "host"));

    if let Some(host) = host {
        let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
        if let Ok(url) = Url::parse(&format!("{proto}://{host}")) {
            return url;
        }
    }

    Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL")
}

/// The OAuth callback endpoint on the derived origin.
pub fn callback_url(headers: &HeaderMap, public_base_url: Option<&str>) -> Url {
    let mut url = derive_origin(headers, public_base_url);
    url.set_path("/auth/callback");
    url.set_query(None);
    url
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_configured_base_url_wins_over_headers() {
        let headers = headers(&[("host", "evil.example.com")]);
        let origin = derive_origin(&headers, Some("https://app.lodestar.dev"));
        assert_eq!(origin.as_str(), "https://app.lodestar.dev/");
    }

    #[test]
    fn test_forwarded_headers_build_origin() {
        let headers = headers(&[
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "app.lodestar.dev"),
            ("host", "10.0.3.7:8080"),
        ]);
        let origin = derive_origin(&headers, None);
        assert_eq!(origin.as_str(), "https://app.lodestar.dev/");
    }

    #[test]
    fn test_host_header_fallback_is_http() {
        let headers = headers(&[("host", "staging.lodestar.dev")]);
        let origin = derive_origin(&headers, None);
        assert_eq!(origin.as_str(), "http://staging.lodestar.dev/");
    }

    #[test]
    fn test_localhost_fallback_when_no_headers() {
        let origin = derive_origin(&HeaderMap::new(), None);
        assert_eq!(origin.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_callback_url_tracks_host_header() {
        // Different inbound hosts must yield different callback targets.
        let first = callback_url(&headers(&[("host", "a.example.com")]), None);
        let second = callback_url(&headers(&[("host", "b.example.com")]), None);
        assert_eq!(first.as_str(), "http://a.example.com/auth/callback");
        assert_eq!(second.as_str(), "http://b.example.com/auth/callback");
    }

    #[test]
    fn test_invalid_configured_url_falls_through() {
        let headers = headers(&[("host", "app.lodestar.dev")]);
        let origin = derive_origin(&headers, Some("not a url"));
        assert_eq!(origin.as_str(), "http://app.lodestar.dev/");
    }
}
