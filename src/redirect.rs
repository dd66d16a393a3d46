//! Redirect-versus-deliver decisions for a completed response head

use url::Url;

use crate::request::LoadRequest;
use crate::response::ResourceResponse;

pub fn is_http_info(status: u16) -> bool {
    (100..200).contains(&status)
}

pub fn is_http_redirect(status: u16) -> bool {
    (300..400).contains(&status) && status != 304
}

pub fn is_http_authentication(status: u16) -> bool {
    status == 401 || status == 407
}

/// Independent redirect signals for one response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedirectSignals {
    /// 3xx redirect status (304 excluded)
    pub by_status: bool,
    /// Transport fetched a different URL than requested (e.g. proxy rewrite)
    pub by_url: bool,
    pub authentication: bool,
}

impl RedirectSignals {
    pub fn is_redirect(&self) -> bool {
        self.by_status || self.by_url
    }
}

/// What finalization should do with the response head
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectPlan {
    /// Ordinary response delivery
    Deliver,
    /// 401/407: left to the auth collaborator, delivered as-is
    Authenticate,
    /// Follow `target`. Delivery is suppressed only for status-driven redirects.
    Follow { target: Url, by_status: bool },
}

/// Decides redirect-vs-deliver and rebuilds the outgoing request
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectCoordinator;

impl RedirectCoordinator {
    pub fn classify(status: u16, effective_url: &str, requested: &Url) -> RedirectSignals {
        RedirectSignals {
            by_status: is_http_redirect(status),
            by_url: effective_url_differs(effective_url, requested),
            authentication: is_http_authentication(status),
        }
    }

    /// Resolve a `Location` value against the current request URL.
    /// Empty or unresolvable targets are not redirects.
    pub fn resolve_location(base: &Url, location: &str) -> Option<Url> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }
        base.join(location).ok()
    }

    pub fn plan(
        response: &ResourceResponse,
        request: &LoadRequest,
        effective_url: &str,
    ) -> RedirectPlan {
        let signals = Self::classify(response.status, effective_url, &request.url);

        if signals.is_redirect() {
            let target = response
                .header("location")
                .and_then(|location| Self::resolve_location(&request.url, &location));

            return match target {
                Some(target) => RedirectPlan::Follow {
                    target,
                    by_status: signals.by_status,
                },
                None => RedirectPlan::Deliver,
            };
        }

        if signals.authentication {
            RedirectPlan::Authenticate
        } else {
            RedirectPlan::Deliver
        }
    }

    pub fn redirect_request(current: &LoadRequest, target: Url) -> LoadRequest {
        current.redirected_to(target)
    }
}

fn effective_url_differs(effective_url: &str, requested: &Url) -> bool {
    if effective_url.is_empty() {
        return false;
    }
    match Url::parse(effective_url) {
        Ok(effective) => effective != *requested,
        Err(_) => effective_url != requested.as_str(),
    }
}
