//! `loadbox fetch`: one load driven the way an embedding main loop would

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::cli::FetchArgs;
use loadbox::config::Config;
use loadbox::hooks::{InterceptionHooks, LoadClient, ResponseAction};
use loadbox::observability::MetricsSnapshot;
use loadbox::response::ResourceResponse;
use loadbox::transport::LoadError;
use loadbox::{DispatchError, JobId, LoadDispatcher, LoadRequest};

const MAIN_LOOP_TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Default, Serialize)]
pub struct FetchReport {
    pub job_id: JobId,
    pub url: String,
    pub final_url: Option<String>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub mime_type: Option<String>,
    pub charset: Option<String>,
    pub headers: Vec<(String, String)>,
    pub redirects: Vec<String>,
    pub body_bytes: usize,
    pub captured_bytes: Option<usize>,
    pub finished: bool,
    pub error: Option<String>,
    pub metrics: Option<MetricsSnapshot>,
}

/// Client that folds callbacks into a report
#[derive(Default)]
struct ReportClient {
    report: Mutex<FetchReport>,
}

impl ReportClient {
    fn update(&self, apply: impl FnOnce(&mut FetchReport)) {
        apply(&mut *self.report.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn take_report(&self) -> FetchReport {
        std::mem::take(&mut *self.report.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl LoadClient for ReportClient {
    fn will_redirect(
        &self,
        _job: JobId,
        _old_request: &LoadRequest,
        new_request: &LoadRequest,
        _previous: &ResourceResponse,
    ) {
        let target = new_request.url.to_string();
        self.update(|report| report.redirects.push(target));
    }

    fn did_receive_response(&self, _job: JobId, response: &ResourceResponse) {
        self.update(|report| {
            report.final_url = response.url.as_ref().map(Url::to_string);
            report.status = Some(response.status);
            report.status_text = Some(response.status_text.clone()).filter(|text| !text.is_empty());
            report.mime_type = Some(response.mime_type.clone()).filter(|mime| !mime.is_empty());
            report.charset = response.charset.clone();
            report.headers = response
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
        });
    }

    fn did_receive_data(&self, _job: JobId, data: &[u8]) {
        self.update(|report| report.body_bytes += data.len());
    }

    fn did_finish_load(&self, _job: JobId) {
        self.update(|report| report.finished = true);
    }

    fn did_fail(&self, _job: JobId, error: &LoadError) {
        let message = error.to_string();
        self.update(|report| report.error = Some(message));
    }
}

/// Captures every response and records the size handed over at load end
#[derive(Default)]
struct CaptureHooks {
    captured: AtomicUsize,
    called: AtomicBool,
}

impl InterceptionHooks for CaptureHooks {
    fn on_response(&self, _job: JobId, _url: &Url, _response: &ResourceResponse) -> ResponseAction {
        ResponseAction::Capture
    }

    fn on_load_end(&self, _job: JobId, _url: &Url, body: &[u8]) -> Option<Vec<u8>> {
        self.captured.store(body.len(), Ordering::Release);
        self.called.store(true, Ordering::Release);
        None
    }
}

pub fn run(config: &Config, args: FetchArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let hooks = Arc::new(CaptureHooks::default());
    let dispatcher = if args.capture {
        let hooks: Arc<dyn InterceptionHooks> = hooks.clone();
        LoadDispatcher::with_hooks(config, Some(hooks))?
    } else {
        LoadDispatcher::from_config(config)?
    };

    let request = build_request(&args)?;
    let client = Arc::new(ReportClient::default());

    let job_id = if args.sync {
        dispatcher.start_synchronous(request, client.clone())?
    } else {
        let job_id = dispatcher.start(request, client.clone())?;
        while dispatcher.is_active(job_id) {
            dispatcher.drain_once();
            std::thread::sleep(MAIN_LOOP_TICK);
        }
        job_id
    };

    let metrics = dispatcher.metrics();
    drop(dispatcher);

    let mut report = client.take_report();
    report.job_id = job_id;
    report.url = args.url.to_string();
    report.metrics = Some(metrics);
    if hooks.called.load(Ordering::Acquire) {
        report.captured_bytes = Some(hooks.captured.load(Ordering::Acquire));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match report.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn build_request(args: &FetchArgs) -> Result<LoadRequest, DispatchError> {
    let headers = args
        .headers
        .iter()
        .map(|header| {
            header
                .split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| DispatchError::InvalidRequest(format!("bad header '{}'", header)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadRequest::builder()
        .url(args.url.clone())
        .headers(headers)
        .build())
}

fn print_report(report: &FetchReport) {
    println!("job {}: {}", report.job_id, report.url);
    for target in &report.redirects {
        println!("  -> {}", target);
    }
    if let Some(status) = report.status {
        println!(
            "status: {} {}",
            status,
            report.status_text.as_deref().unwrap_or_default()
        );
    }
    if let Some(url) = &report.final_url {
        println!("url: {}", url);
    }
    if let Some(mime_type) = &report.mime_type {
        match &report.charset {
            Some(charset) => println!("type: {}; charset={}", mime_type, charset),
            None => println!("type: {}", mime_type),
        }
    }
    println!("body: {} bytes", report.body_bytes);
    if let Some(captured) = report.captured_bytes {
        println!("captured: {} bytes", captured);
    }
    if let Some(error) = &report.error {
        println!("error: {}", error);
    }
}
