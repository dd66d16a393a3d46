//! Outgoing load request model

use bon::Builder;
use bytes::Bytes;
use reqwest::Method;
use url::Url;
use uuid::Uuid;

/// One outgoing request as the client issued it (or as a redirect rewrote it).
///
/// A job owns exactly one current request; following a redirect replaces it
/// wholesale with a copy pointing at the new URL.
#[derive(Debug, Clone, Builder)]
pub struct LoadRequest {
    pub url: Url,
    #[builder(default = Method::GET)]
    pub method: Method,
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Correlation id carried through tracing spans
    #[builder(default = Uuid::new_v4())]
    pub trace_id: Uuid,
}

impl LoadRequest {
    /// Plain GET for `url`
    pub fn get(url: Url) -> Self {
        Self::builder().url(url).build()
    }

    /// Case-insensitive header lookup (first match wins)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn referrer(&self) -> Option<&str> {
        self.header("Referer")
    }

    pub fn is_http_family(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Copy of this request pointing at `url`, everything else unchanged
    pub fn redirected_to(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let request = LoadRequest::builder()
            .url(Url::parse("http://example.com/a").unwrap())
            .build();

        assert_eq!(request.method, Method::GET);
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
        assert!(request.is_http_family());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = LoadRequest::builder()
            .url(Url::parse("https://example.com/").unwrap())
            .headers(vec![("referer".to_string(), "https://origin/".to_string())])
            .build();

        assert_eq!(request.referrer(), Some("https://origin/"));
        assert_eq!(request.header("REFERER"), Some("https://origin/"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_redirected_to_keeps_everything_but_url() {
        let request = LoadRequest::builder()
            .url(Url::parse("http://a/old").unwrap())
            .method(Method::POST)
            .headers(vec![("X-Test".to_string(), "1".to_string())])
            .build();

        let next = request.redirected_to(Url::parse("http://a/next").unwrap());
        assert_eq!(next.url.as_str(), "http://a/next");
        assert_eq!(next.method, Method::POST);
        assert_eq!(next.header("x-test"), Some("1"));
        assert_eq!(next.trace_id, request.trace_id);
    }

    #[test]
    fn test_file_scheme_is_not_http_family() {
        let request = LoadRequest::get(Url::parse("file:///tmp/index.html").unwrap());
        assert!(!request.is_http_family());
    }
}
