//! Reference HTTP transport built on reqwest

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, Proxy, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{LoadError, Transport, TransportSink};
use crate::config::TransportConfig;
use crate::request::LoadRequest;

/// HTTP(S) transport with manual redirect following.
///
/// reqwest's own redirect handling is disabled so that every hop's head
/// reaches the dispatcher as raw lines (status line, headers, blank line),
/// the same shape a wire-level client would report.
pub struct ReqwestTransport {
    client: Client,
    max_redirects: usize,
    proxied: bool,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, LoadError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(url) = &config.proxy {
            let proxy = Proxy::all(url)
                .map_err(|e| LoadError::InvalidUrl(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            proxied: config.proxy.is_some(),
        })
    }

    async fn load(&self, request: &LoadRequest, sink: &TransportSink) -> Result<(), LoadError> {
        match request.url.scheme() {
            "http" | "https" => self.load_http(request, sink).await,
            "file" => load_file(&request.url, sink).await,
            scheme => Err(LoadError::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
        }
    }

    async fn load_http(&self, request: &LoadRequest, sink: &TransportSink) -> Result<(), LoadError> {
        sink.set_proxied(self.proxied && request.url.scheme() == "https");

        let mut url = request.url.clone();
        let mut method = request.method.clone();
        let mut body = request.body.clone();
        let mut hops = 0;

        loop {
            if sink.is_cancelled() {
                return Err(LoadError::Cancelled);
            }

            let mut outgoing = self.client.request(method.clone(), url.clone());
            for (name, value) in &request.headers {
                outgoing = outgoing.header(name, value);
            }
            if let Some(body) = &body {
                outgoing = outgoing.body(body.clone());
            }

            debug!(job_id = sink.job_id(), %url, hop = hops, "Sending request");
            let mut response = outgoing.send().await?;
            let status = response.status();
            report_head(&response, sink);

            if let Some(next) = redirect_target(&response, &url) {
                hops += 1;
                if hops > self.max_redirects {
                    return Err(LoadError::TooManyRedirects);
                }
                if rewrites_to_get(status, &method) {
                    method = Method::GET;
                    body = None;
                }
                url = next;
                continue;
            }

            while let Some(chunk) = response.chunk().await? {
                sink.resumed().await;
                if sink.is_cancelled() {
                    return Err(LoadError::Cancelled);
                }
                sink.body(&chunk);
            }
            return Ok(());
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: LoadRequest, sink: TransportSink) {
        match self.load(&request, &sink).await {
            Ok(()) => {
                sink.finished();
            }
            Err(LoadError::Cancelled) => {
                debug!(job_id = sink.job_id(), url = %request.url, "Transfer abandoned");
            }
            Err(e) => {
                warn!(job_id = sink.job_id(), url = %request.url, error = %e, "Load failed");
                sink.failed(e);
            }
        }
    }
}

/// Record progress, then emit the head as raw lines
fn report_head(response: &Response, sink: &TransportSink) {
    sink.record_status(response.status().as_u16());
    sink.record_effective_url(response.url().as_str());
    sink.record_content_length(response.content_length());

    let status_line = format!("{:?} {}\r\n", response.version(), response.status());
    sink.header_line(status_line.as_bytes());

    for (name, value) in response.headers() {
        let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
        line.extend_from_slice(name.as_str().as_bytes());
        line.extend_from_slice(b": ");
        line.extend_from_slice(value.as_bytes());
        line.extend_from_slice(b"\r\n");
        sink.header_line(&line);
    }
    sink.header_line(b"\r\n");
}

fn redirect_target(response: &Response, current: &Url) -> Option<Url> {
    let status = response.status();
    if !status.is_redirection() || status == StatusCode::NOT_MODIFIED {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location.trim()).ok()
}

fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    status == StatusCode::SEE_OTHER
        || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
            && *method == Method::POST)
}

async fn load_file(url: &Url, sink: &TransportSink) -> Result<(), LoadError> {
    let path = url
        .to_file_path()
        .map_err(|_| LoadError::InvalidUrl(url.to_string()))?;
    let data = tokio::fs::read(&path).await?;

    sink.record_status(200);
    sink.record_content_length(Some(data.len() as u64));
    sink.local_response();
    if !data.is_empty() {
        sink.body(&data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_see_other_always_rewrites() {
        assert!(rewrites_to_get(StatusCode::SEE_OTHER, &Method::PUT));
        assert!(rewrites_to_get(StatusCode::FOUND, &Method::POST));
        assert!(!rewrites_to_get(StatusCode::FOUND, &Method::GET));
        assert!(!rewrites_to_get(StatusCode::TEMPORARY_REDIRECT, &Method::POST));
    }

    #[test]
    fn test_client_builds_from_defaults() {
        let transport = ReqwestTransport::new(&TransportConfig::default()).unwrap();
        assert_eq!(transport.max_redirects, 10);
        assert!(!transport.proxied);
    }

    #[test]
    fn test_proxy_marks_transport_proxied() {
        let config = TransportConfig {
            proxy: Some("http://proxy:3128".to_string()),
            ..TransportConfig::default()
        };
        assert!(ReqwestTransport::new(&config).unwrap().proxied);
    }
}
