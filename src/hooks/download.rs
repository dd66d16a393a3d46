use crate::response::ResourceResponse;

/// Types rendered inline; anything else is offered as a download
const DISPLAY_MIME_PREFIXES: &[&str] = &[
    "text/css",
    "text/javascript",
    "text/plain",
    "text/html",
    "text/xml",
    "text/xsl",
    "image/png",
    "image/gif",
    "image/jpeg",
    "image/bmp",
    "image/webp",
    "image/x-icon",
    "image/svg+xml",
    "audio/ogg",
    "audio/midi",
    "audio/x-midi",
    "video/x-msvideo",
    "video/mpeg",
    "video/mp4",
    "video/x-ms-wmv",
    "font/woff2",
    "font/opentype",
    "application/xhtml+xml",
    "application/font-woff",
    "application/x-javascript",
    "application/javascript",
];

pub fn is_attachment(content_disposition: &str) -> bool {
    content_disposition
        .split(';')
        .next()
        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("attachment"))
}

pub fn is_download_response(response: &ResourceResponse) -> bool {
    if response
        .header("content-disposition")
        .is_some_and(|value| is_attachment(&value))
    {
        return true;
    }

    let mime_type = response.mime_type.to_ascii_lowercase();
    !DISPLAY_MIME_PREFIXES
        .iter()
        .any(|prefix| mime_type.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(mime_type: &str, disposition: Option<&str>) -> ResourceResponse {
        let mut response = ResourceResponse::new();
        response.mime_type = mime_type.to_string();
        if let Some(disposition) = disposition {
            response.set_header("Content-Disposition", disposition);
        }
        response
    }

    #[test]
    fn test_display_types_are_not_downloads() {
        assert!(!is_download_response(&response("text/html", None)));
        assert!(!is_download_response(&response("image/png", None)));
        assert!(!is_download_response(&response("application/javascript", None)));
    }

    #[test]
    fn test_unknown_types_are_downloads() {
        assert!(is_download_response(&response("application/zip", None)));
        assert!(is_download_response(&response("", None)));
    }

    #[test]
    fn test_attachment_wins_over_display_type() {
        assert!(is_download_response(&response(
            "text/html",
            Some("attachment; filename=\"page.html\"")
        )));
        assert!(!is_download_response(&response("text/html", Some("inline"))));
    }
}
