//! End-to-end tests: real reqwest transport against a local axum server
//!
//! The server runs on its own tokio runtime; the test thread plays the
//! embedding main loop and drains the dispatcher.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::runtime::Runtime;
use url::Url;

use loadbox::config::Config;
use loadbox::hooks::LoadClient;
use loadbox::response::ResourceResponse;
use loadbox::transport::LoadError;
use loadbox::{JobId, LoadDispatcher, LoadRequest};

#[derive(Debug, Default)]
struct Outcome {
    redirects: Vec<String>,
    statuses: Vec<u16>,
    mime_type: Option<String>,
    charset: Option<String>,
    final_url: Option<String>,
    body: Vec<u8>,
    finished: bool,
    error: Option<LoadError>,
}

#[derive(Default)]
struct CollectingClient {
    outcome: Mutex<Outcome>,
}

impl LoadClient for CollectingClient {
    fn will_redirect(&self, _job: JobId, _old: &LoadRequest, new: &LoadRequest, _previous: &ResourceResponse) {
        self.outcome.lock().unwrap().redirects.push(new.url.to_string());
    }

    fn did_receive_response(&self, _job: JobId, response: &ResourceResponse) {
        let mut outcome = self.outcome.lock().unwrap();
        outcome.statuses.push(response.status);
        outcome.mime_type = Some(response.mime_type.clone());
        outcome.charset = response.charset.clone();
        outcome.final_url = response.url.as_ref().map(Url::to_string);
    }

    fn did_receive_data(&self, _job: JobId, data: &[u8]) {
        self.outcome.lock().unwrap().body.extend_from_slice(data);
    }

    fn did_finish_load(&self, _job: JobId) {
        self.outcome.lock().unwrap().finished = true;
    }

    fn did_fail(&self, _job: JobId, error: &LoadError) {
        self.outcome.lock().unwrap().error = Some(error.clone());
    }
}

/// Mock server handle; dropping it stops the runtime
struct MockServer {
    _runtime: Runtime,
    base: Url,
}

impl MockServer {
    fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let addr = runtime.block_on(async {
            let app = Router::new()
                .route("/old", get(|| async { redirect("/new") }))
                .route("/hop", get(|| async { redirect("/old") }))
                .route("/loop", get(|| async { redirect("/loop") }))
                .route("/new", get(serve_page))
                .route("/missing", get(|| async { StatusCode::NOT_FOUND }));

            let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
                .await
                .unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            addr
        });

        println!("Mock server listening on {}", addr);
        Self {
            _runtime: runtime,
            base: Url::parse(&format!("http://{}/", addr)).unwrap(),
        }
    }

    fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }
}

fn redirect(location: &'static str) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

async fn serve_page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<p>hello</p>",
    )
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.transport.io_threads = 2;
    config.transport.max_redirects = 3;
    config.dispatcher.drain_poll_interval_ms = 1;
    config.dispatcher.fatal_on_drain_timeout = false;
    config
}

/// Drain like a main loop until the job is torn down
fn run_to_completion(dispatcher: &LoadDispatcher, id: JobId) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while dispatcher.is_active(id) {
        assert!(Instant::now() < deadline, "job {} did not complete", id);
        dispatcher.drain_once();
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn load(dispatcher: &LoadDispatcher, url: Url) -> Outcome {
    let client = Arc::new(CollectingClient::default());
    let id = dispatcher
        .start(LoadRequest::get(url), client.clone())
        .unwrap();
    run_to_completion(dispatcher, id);
    std::mem::take(&mut *client.outcome.lock().unwrap())
}

#[test]
fn test_redirect_then_page() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, server.url("/old"));

    assert_eq!(outcome.redirects, vec![server.url("/new").to_string()]);
    assert_eq!(outcome.statuses, vec![200]);
    assert_eq!(outcome.mime_type.as_deref(), Some("text/html"));
    assert_eq!(outcome.charset.as_deref(), Some("utf-8"));
    assert_eq!(outcome.final_url, Some(server.url("/new").to_string()));
    assert_eq!(outcome.body, b"<p>hello</p>");
    assert!(outcome.finished);
    assert!(outcome.error.is_none());

    let metrics = dispatcher.metrics();
    assert_eq!(metrics.redirects_followed, 1);
    assert_eq!(metrics.jobs_started, metrics.jobs_released);
}

#[test]
fn test_redirect_chain() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, server.url("/hop"));

    assert_eq!(
        outcome.redirects,
        vec![server.url("/old").to_string(), server.url("/new").to_string()]
    );
    assert_eq!(outcome.statuses, vec![200]);
    assert!(outcome.finished);
}

#[test]
fn test_redirect_loop_fails() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, server.url("/loop"));

    assert_eq!(outcome.error, Some(LoadError::TooManyRedirects));
    assert!(!outcome.finished);
    assert!(outcome.statuses.is_empty());
}

#[test]
fn test_error_status_is_delivered() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, server.url("/missing"));

    assert_eq!(outcome.statuses, vec![404]);
    assert!(outcome.finished);
    assert!(outcome.error.is_none());
}

#[test]
fn test_synchronous_load() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();
    let client = Arc::new(CollectingClient::default());

    dispatcher
        .start_synchronous(LoadRequest::get(server.url("/new")), client.clone())
        .unwrap();

    let outcome = client.outcome.lock().unwrap();
    assert_eq!(outcome.statuses, vec![200]);
    assert_eq!(outcome.body, b"<p>hello</p>");
    assert!(outcome.finished);
    assert_eq!(dispatcher.pending_tasks(), 0);
    assert_eq!(dispatcher.active_jobs(), 0);
}

#[test]
fn test_file_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"local bytes").unwrap();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, Url::from_file_path(file.path()).unwrap());

    assert_eq!(outcome.statuses, vec![200]);
    assert_eq!(outcome.body, b"local bytes");
    assert!(outcome.finished);
}

#[test]
fn test_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();

    let outcome = load(&dispatcher, Url::from_file_path(dir.path().join("absent.txt")).unwrap());

    assert!(matches!(outcome.error, Some(LoadError::Io(_))));
    assert!(outcome.statuses.is_empty());
}

#[test]
fn test_cancel_in_flight() {
    let server = MockServer::start();
    let dispatcher = LoadDispatcher::from_config(&test_config()).unwrap();
    let client = Arc::new(CollectingClient::default());

    let id = dispatcher
        .start(LoadRequest::get(server.url("/new")), client.clone())
        .unwrap();
    assert!(dispatcher.cancel(id));
    run_to_completion(&dispatcher, id);

    let outcome = client.outcome.lock().unwrap();
    assert!(outcome.statuses.is_empty());
    assert!(!outcome.finished);
    assert!(outcome.error.is_none());
    assert_eq!(dispatcher.context().in_flight_transfers(), 0);
}
