use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Header names whose repeated occurrences merge instead of replacing
const APPENDABLE_HEADERS: &[&str] = &[
    "access-control-allow-headers",
    "access-control-allow-methods",
    "access-control-allow-origin",
    "access-control-expose-headers",
    "allow",
    "cache-control",
    "connection",
    "content-encoding",
    "content-language",
    "if-match",
    "if-none-match",
    "keep-alive",
    "pragma",
    "proxy-authenticate",
    "public",
    "server",
    "set-cookie",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "vary",
    "via",
    "warning",
    "www-authenticate",
];

pub fn is_appendable_header(name: &str) -> bool {
    APPENDABLE_HEADERS
        .iter()
        .any(|header| header.eq_ignore_ascii_case(name))
}

/// Response state accumulated for one job
#[derive(Debug, Clone, Default)]
pub struct ResourceResponse {
    /// Effective URL the transport fetched
    pub url: Option<Url>,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    /// Lowercased `type/subtype`, empty when unknown
    pub mime_type: String,
    pub charset: Option<String>,
    pub expected_content_length: Option<u64>,
}

impl ResourceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values for `name` joined with `", "`
    pub fn header(&self, name: &str) -> Option<String> {
        let mut values = self.headers.get_all(name).iter().peekable();
        values.peek()?;

        let joined = values
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        Some(joined)
    }

    /// Replace any prior value for `name`. Returns false for names or values
    /// that are not valid HTTP tokens.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match parse_pair(name, value) {
            Some((name, value)) => {
                self.headers.insert(name, value);
                true
            }
            None => false,
        }
    }

    /// Add another value for `name`, keeping earlier ones
    pub fn add_header(&mut self, name: &str, value: &str) -> bool {
        match parse_pair(name, value) {
            Some((name, value)) => {
                self.headers.append(name, value);
                true
            }
            None => false,
        }
    }

    /// Store a header line's value according to the appendable policy
    pub fn store_header(&mut self, name: &str, value: &str) -> bool {
        if is_appendable_header(name) {
            self.add_header(name, value)
        } else {
            self.set_header(name, value)
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn parse_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appendable_names_ignore_case() {
        assert!(is_appendable_header("Set-Cookie"));
        assert!(is_appendable_header("VARY"));
        assert!(!is_appendable_header("Content-Type"));
        assert!(!is_appendable_header("Location"));
    }

    #[test]
    fn test_appendable_header_accumulates() {
        let mut response = ResourceResponse::new();
        assert!(response.store_header("Cache-Control", "no-cache"));
        assert!(response.store_header("cache-control", "no-store"));

        assert_eq!(response.header("Cache-Control").as_deref(), Some("no-cache, no-store"));
    }

    #[test]
    fn test_plain_header_is_last_write_wins() {
        let mut response = ResourceResponse::new();
        response.store_header("Content-Type", "text/plain");
        response.store_header("content-type", "text/html");

        assert_eq!(response.header("content-type").as_deref(), Some("text/html"));
        assert_eq!(response.headers.get_all("content-type").iter().count(), 1);
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let mut response = ResourceResponse::new();
        assert!(!response.set_header("bad name", "x"));
        assert!(!response.set_header("X-Ok", "line\nbreak"));
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut response = ResourceResponse::new();
        response.status = 302;
        response.status_text = "Found".to_string();
        response.set_header("Location", "/next");

        response.reset();
        assert_eq!(response.status, 0);
        assert!(response.status_text.is_empty());
        assert!(response.header("location").is_none());
    }
}
