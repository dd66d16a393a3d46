//! Media-type parameter extraction for `Content-Type` values

/// Streaming multipart type that carries a sequence of replacement documents
pub const MULTIPART_MIXED_REPLACE: &str = "multipart/x-mixed-replace";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaType {
    pub mime_type: String,
    pub charset: Option<String>,
    pub boundary: Option<String>,
}

/// Classify a `Content-Type` value.
///
/// Well-formed values go through `mime`; anything it rejects falls back to a
/// lenient split so a sloppy server still yields a usable MIME type.
pub fn parse_media_type(content_type: &str) -> MediaType {
    match content_type.trim().parse::<mime::Mime>() {
        Ok(media) => MediaType {
            mime_type: media.essence_str().to_ascii_lowercase(),
            charset: media
                .get_param(mime::CHARSET)
                .and_then(|value| clean_param(value.as_str())),
            boundary: media
                .get_param(mime::BOUNDARY)
                .and_then(|value| clean_param(value.as_str())),
        },
        Err(_) => parse_lenient(content_type),
    }
}

pub fn is_multipart_replace(mime_type: &str) -> bool {
    mime_type.eq_ignore_ascii_case(MULTIPART_MIXED_REPLACE)
}

fn parse_lenient(content_type: &str) -> MediaType {
    let mut parts = content_type.split(';');
    let mime_type = parts
        .next()
        .map(|essence| essence.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let mut media = MediaType {
        mime_type,
        ..MediaType::default()
    };

    for param in parts {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("charset") {
            media.charset = clean_param(value);
        } else if name.eq_ignore_ascii_case("boundary") {
            media.boundary = clean_param(value);
        }
    }

    media
}

fn clean_param(value: &str) -> Option<String> {
    let value = value.trim().trim_matches('"').trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_and_charset() {
        let media = parse_media_type("text/html; charset=utf-8");
        assert_eq!(media.mime_type, "text/html");
        assert_eq!(media.charset.as_deref(), Some("utf-8"));
        assert!(media.boundary.is_none());
    }

    #[test]
    fn test_mime_type_is_lowercased() {
        let media = parse_media_type("Text/HTML");
        assert_eq!(media.mime_type, "text/html");
        assert!(media.charset.is_none());
    }

    #[test]
    fn test_multipart_boundary() {
        let media = parse_media_type("multipart/x-mixed-replace; boundary=frame");
        assert!(is_multipart_replace(&media.mime_type));
        assert_eq!(media.boundary.as_deref(), Some("frame"));
    }

    #[test]
    fn test_quoted_boundary_is_unquoted() {
        let media = parse_media_type("multipart/x-mixed-replace; boundary=\"my frame\"");
        assert_eq!(media.boundary.as_deref(), Some("my frame"));
    }

    #[test]
    fn test_empty_boundary_disables_multipart() {
        let media = parse_media_type("multipart/x-mixed-replace; boundary=");
        assert!(media.boundary.is_none());
    }

    #[test]
    fn test_lenient_fallback() {
        let media = parse_media_type("text/html; charset=latin1; junk");
        assert_eq!(media.mime_type, "text/html");
        assert_eq!(media.charset.as_deref(), Some("latin1"));
    }

    #[test]
    fn test_empty_content_type() {
        assert_eq!(parse_media_type(""), MediaType::default());
    }
}
