use super::headers::ResourceResponse;

/// Where the parser is within one response head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    #[default]
    AwaitingStatusLine,
    AccumulatingHeaders,
    HeadersComplete,
}

/// What a single fed line turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    StatusLine,
    Header,
    /// Blank line: the response head is complete and must be finalized
    HeadersComplete,
    Ignored,
}

/// Incremental status/header parser.
///
/// Lines arrive one per call in wire order. The transport may follow
/// redirects internally, so several status lines can show up for one job;
/// a status line after a completed head starts a fresh header block.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    state: ParseState,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Feed one raw header line.
    ///
    /// `status_code` is the numeric code the transport reported for this
    /// line; when it is 0 the code is read from the status line itself.
    pub fn feed_line(
        &mut self,
        line: &str,
        status_code: u16,
        response: &mut ResourceResponse,
    ) -> LineOutcome {
        let content = line.trim_end_matches(['\r', '\n']);

        if content.is_empty() {
            self.state = ParseState::HeadersComplete;
            return LineOutcome::HeadersComplete;
        }

        if is_status_line(content) {
            if self.state == ParseState::HeadersComplete {
                response.headers.clear();
            }
            apply_status_line(content, status_code, response);
            self.state = ParseState::AccumulatingHeaders;
            return LineOutcome::StatusLine;
        }

        if let Some((key, value)) = content.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || !response.store_header(key, value) {
                return LineOutcome::Ignored;
            }
            if self.state == ParseState::AwaitingStatusLine {
                self.state = ParseState::AccumulatingHeaders;
            }
            return LineOutcome::Header;
        }

        LineOutcome::Ignored
    }
}

fn is_status_line(line: &str) -> bool {
    line.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("HTTP/"))
}

fn apply_status_line(line: &str, status_code: u16, response: &mut ResourceResponse) {
    let code = if status_code == 0 {
        line.split_whitespace()
            .nth(1)
            .and_then(|token| token.parse::<u16>().ok())
            .unwrap_or(0)
    } else {
        status_code
    };

    response.status = code;
    if code == 0 {
        response.status_text.clear();
        return;
    }
    let code_text = code.to_string();
    if let Some(pos) = line.find(&code_text) {
        response.status_text = line[pos + code_text.len()..].trim().to_string();
    }
}
