//! Main-thread execution of one task against its job.
//!
//! Every handler re-acquires the job by id; a job that is gone, cancelled or
//! owned by a shut-down context turns the task into a no-op. Client and hook
//! callbacks are invoked with no job lock held, since they may call back
//! into the dispatcher.

use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::task::{CapturedResult, Task, TaskAction};
use crate::context::LoadContext;
use crate::hooks::{LoadObservation, ObservationKind, RedirectAction, ResponseAction, is_download_response};
use crate::redirect::{RedirectCoordinator, RedirectPlan, is_http_info};
use crate::registry::JobGuard;
use crate::response::media::is_multipart_replace;
use crate::response::{LineOutcome, ResponseBuilder, parse_media_type};
use crate::transport::LoadError;

pub(crate) fn run(ctx: &LoadContext, task: Task) {
    let (id, action) = task.into_parts();
    let Some(guard) = ctx.registry().acquire(id) else {
        trace!(job_id = id, kind = action.name(), "Job already released, task dropped");
        return;
    };
    trace!(job_id = id, kind = action.name(), "Running task");

    match action {
        TaskAction::RemovedFromTransport | TaskAction::Cancelled => release(ctx, guard),
        _ if !is_live(ctx, &guard) => {
            trace!(job_id = id, "Job cancelled, task skipped");
        }
        TaskAction::BodyData(captured) => on_body_data(ctx, &guard, captured),
        TaskAction::HeaderLine(captured) => on_header_line(ctx, &guard, &captured),
        TaskAction::LoadFinished(captured) => on_load_finished(ctx, &guard, &captured),
        TaskAction::LocalResponseReady(captured) => on_local_response_ready(ctx, &guard, &captured),
        TaskAction::MultipartContentEnded => on_multipart_ended(&guard),
        TaskAction::LoadFailed(error) => on_load_failed(&guard, &error),
        TaskAction::HookRequestReady => on_hook_request(ctx, &guard),
    }
}

fn is_live(ctx: &LoadContext, guard: &JobGuard<'_>) -> bool {
    if ctx.is_shutdown() {
        return false;
    }
    let cancelled = guard.lock().is_cancelled();
    !cancelled
}

fn release(ctx: &LoadContext, guard: JobGuard<'_>) {
    let id = guard.id();
    ctx.forget_transfer(id);

    match guard.release(&ctx.drain_policy()) {
        Ok(()) => info!(job_id = id, "Load released"),
        Err(e) => {
            error!(job_id = id, error = %e, "Job teardown did not drain");
            if ctx.config().fatal_on_drain_timeout {
                panic!("job {id} teardown did not drain: {e}");
            }
        }
    }
}

fn on_body_data(ctx: &LoadContext, guard: &JobGuard<'_>, captured: CapturedResult) {
    let id = guard.id();
    let synthesize = {
        let job = guard.lock();
        !job.response_fired() && !job.is_capturing()
    };
    if synthesize {
        on_local_response(ctx, guard, &captured);
        if !is_live(ctx, guard) {
            return;
        }
    }

    let mut job = guard.lock();
    if job.is_capturing() {
        let limit = ctx.config().max_capture_bytes.as_usize();
        let buffer = job.capture.get_or_insert_with(Vec::new);
        if buffer.len().saturating_add(captured.len()) > limit {
            let client = job.client.clone();
            job.flags.finished = true;
            drop(job);

            warn!(job_id = id, limit, "Captured body over limit, load stopped");
            if let Some(client) = client {
                client.did_fail(id, &LoadError::CaptureOverflow { limit });
            }
            ctx.cancel(id);
            return;
        }
        buffer.extend_from_slice(&captured.data);
        return;
    }

    if let Some(mut decoder) = job.multipart.take() {
        drop(job);
        decoder.content_received(&captured.data);
        guard.lock().multipart.get_or_insert(decoder);
        return;
    }

    let client = job.client.clone();
    drop(job);
    if let Some(client) = client {
        client.did_receive_data(id, &captured.data);
    }
}

fn on_header_line(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) {
    let line = String::from_utf8_lossy(&captured.data);
    let outcome = {
        let mut job = guard.lock();
        let job = &mut *job;
        job.builder
            .feed_line(&line, captured.http_code, &mut job.response)
    };

    if outcome == LineOutcome::HeadersComplete {
        finalize_response(ctx, guard, captured);
    }
}

/// Headers are complete: decide between delivering, redirecting and waiting
fn finalize_response(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) {
    let is_http = {
        let mut job = guard.lock();
        job.response.expected_content_length = captured.content_length;
        job.response.url = Some(resolve_url(&captured.effective_url, &job.request.url));
        if job.response.status == 0 {
            job.response.status = captured.http_code;
        }
        job.request.is_http_family()
    };

    let deliver = !is_http || finalize_http(ctx, guard, captured);
    if deliver {
        deliver_response(guard);
    }
}

fn finalize_http(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) -> bool {
    let id = guard.id();

    let (boundary, client) = {
        let mut job = guard.lock();
        if is_http_info(job.response.status) {
            trace!(job_id = id, status = job.response.status, "Informational response, waiting for the real head");
            return false;
        }

        let media = job
            .response
            .header("content-type")
            .map(|value| parse_media_type(&value))
            .unwrap_or_default();
        job.response.mime_type = media.mime_type;
        job.response.charset = media.charset;
        job.effective_url = Some(captured.effective_url.clone());

        let boundary = media
            .boundary
            .filter(|_| is_multipart_replace(&job.response.mime_type));
        (boundary, job.client.clone())
    };

    if let (Some(boundary), Some(factory)) = (boundary, ctx.multipart_factory()) {
        let decoder = factory.create(id, &boundary, client);
        guard.lock().multipart = Some(decoder);
        debug!(job_id = id, boundary = %boundary, "Multipart decoding enabled");
    }

    let plan = {
        let job = guard.lock();
        RedirectCoordinator::plan(&job.response, &job.request, &captured.effective_url)
    };

    match plan {
        RedirectPlan::Follow { target, by_status } => {
            if !follow_redirect(ctx, guard, target, by_status) {
                return false;
            }
            if by_status {
                return false;
            }
        }
        RedirectPlan::Authenticate => {
            debug!(job_id = id, "Authentication challenge left to the client");
        }
        RedirectPlan::Deliver => {}
    }

    consult_response_hooks(ctx, guard)
}

/// Response-arrival hook and download detection. Returns whether the
/// response should be delivered now.
fn consult_response_hooks(ctx: &LoadContext, guard: &JobGuard<'_>) -> bool {
    let id = guard.id();
    let Some(hooks) = ctx.hooks() else {
        let capturing = guard.lock().is_capturing();
        return !capturing;
    };

    let (url, response, observation) = {
        let job = guard.lock();
        let observation = LoadObservation {
            kind: ObservationKind::ResponseDetails,
            url: job.request.url.clone(),
            new_url: None,
            method: job.request.method.to_string(),
            referrer: job.request.referrer().map(str::to_string),
            status: job.response.status,
        };
        (job.request.url.clone(), job.response.clone(), observation)
    };
    hooks.observe(id, &observation);

    match hooks.on_response(id, &url, &response) {
        ResponseAction::Deliver => {}
        ResponseAction::Capture => {
            debug!(job_id = id, "Response captured for the load-end hook");
            guard.lock().flags.capturing = true;
        }
        ResponseAction::Stop => {
            info!(job_id = id, "Load stopped by response hook");
            ctx.cancel(id);
            return false;
        }
    }

    if is_download_response(&response) && hooks.on_download(id, &url) {
        info!(job_id = id, mime_type = %response.mime_type, "Download claimed by hook");
        ctx.cancel(id);
        return false;
    }

    let capturing = guard.lock().is_capturing();
    !capturing
}

/// Returns false when the redirect was vetoed and the job cancelled
fn follow_redirect(ctx: &LoadContext, guard: &JobGuard<'_>, target: Url, by_status: bool) -> bool {
    let id = guard.id();
    let (old_request, previous, client) = {
        let job = guard.lock();
        (job.request.clone(), job.response.clone(), job.client.clone())
    };

    if let Some(hooks) = ctx.hooks() {
        hooks.observe(
            id,
            &LoadObservation {
                kind: ObservationKind::Redirect,
                url: old_request.url.clone(),
                new_url: Some(target.clone()),
                method: old_request.method.to_string(),
                referrer: old_request.referrer().map(str::to_string),
                status: previous.status,
            },
        );
        if hooks.on_redirect(id, &target) == RedirectAction::Cancel {
            info!(job_id = id, %target, "Redirect vetoed by hook");
            ctx.cancel(id);
            return false;
        }
    }

    let new_request = RedirectCoordinator::redirect_request(&old_request, target);
    if let Some(client) = client {
        client.will_redirect(id, &old_request, &new_request, &previous);
    }
    if !is_live(ctx, guard) {
        return false;
    }

    debug!(job_id = id, from = %old_request.url, to = %new_request.url, by_status, "Following redirect");
    {
        let mut job = guard.lock();
        if by_status {
            job.response.reset();
            job.builder = ResponseBuilder::new();
        }
        job.request = new_request;
    }
    ctx.metrics().redirect_followed();
    true
}

/// Hand the response to the client at most once per job
fn deliver_response(guard: &JobGuard<'_>) {
    let id = guard.id();
    let (client, response) = {
        let mut job = guard.lock();
        if job.is_cancelled() || job.flags.response_fired {
            return;
        }
        job.flags.response_fired = true;
        (job.client.clone(), job.response.clone())
    };

    debug!(job_id = id, status = response.status, mime_type = %response.mime_type, "Response delivered");
    if let Some(client) = client {
        client.did_receive_response(id, &response);
    }
}

/// Transport says a non-HTTP response is ready. A capturing job keeps the
/// response back until load end, as the HTTP path does.
fn on_local_response_ready(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) {
    let capturing = guard.lock().is_capturing();
    if capturing {
        fill_local_response(guard, captured);
        trace!(job_id = guard.id(), "Local response held for capture");
        return;
    }
    on_local_response(ctx, guard, captured);
}

/// Synthesize a response for loads that never produced an HTTP head
fn on_local_response(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) {
    if !fill_local_response(guard, captured) {
        return;
    }
    if is_live(ctx, guard) {
        deliver_response(guard);
    }
}

/// Returns false when a response already went out
fn fill_local_response(guard: &JobGuard<'_>, captured: &CapturedResult) -> bool {
    let mut job = guard.lock();
    if job.response_fired() {
        return false;
    }
    if job.response.url.is_none() {
        job.response.url = Some(resolve_url(&captured.effective_url, &job.request.url));
    }
    if job.response.status == 0 {
        job.response.status = captured.http_code;
    }
    if job.response.expected_content_length.is_none() {
        job.response.expected_content_length = captured.content_length;
    }
    true
}

fn on_load_finished(ctx: &LoadContext, guard: &JobGuard<'_>, captured: &CapturedResult) {
    let id = guard.id();
    let fired = guard.lock().response_fired();
    if !fired {
        on_local_response(ctx, guard, captured);
        if !is_live(ctx, guard) {
            return;
        }
    }

    let (client, body) = {
        let mut job = guard.lock();
        job.flags.finished = true;
        (job.client.clone(), job.capture.take())
    };

    info!(job_id = id, "Load finished");
    if let Some(client) = client {
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            client.did_receive_data(id, &body);
        }
        client.did_finish_load(id);
    }
}

/// Flush and close the decoder. It is dropped afterwards, so a transport
/// that signalled the end itself before finishing closes it only once.
fn on_multipart_ended(guard: &JobGuard<'_>) {
    let (mut decoder, pending) = {
        let mut job = guard.lock();
        let Some(decoder) = job.multipart.take() else {
            return;
        };
        (decoder, job.capture.take())
    };

    if let Some(pending) = pending.filter(|pending| !pending.is_empty()) {
        decoder.content_received(&pending);
    }
    decoder.content_ended();
    trace!(job_id = guard.id(), "Multipart content ended");
}

fn on_load_failed(guard: &JobGuard<'_>, error: &LoadError) {
    let id = guard.id();
    let client = {
        let mut job = guard.lock();
        job.flags.finished = true;
        job.client.clone()
    };

    warn!(job_id = id, error = %error, "Load failed");
    if let Some(client) = client {
        client.did_fail(id, error);
    }
}

/// Give the captured body to the load-end hook, exactly once
fn on_hook_request(ctx: &LoadContext, guard: &JobGuard<'_>) {
    let Some(hooks) = ctx.hooks() else {
        return;
    };
    let id = guard.id();

    let (url, body) = {
        let mut job = guard.lock();
        if !job.is_capturing() || job.flags.hook_delivered {
            return;
        }
        job.flags.hook_delivered = true;
        (job.request.url.clone(), job.capture.take().unwrap_or_default())
    };

    debug!(job_id = id, bytes = body.len(), "Captured body handed to hook");
    let replacement = hooks.on_load_end(id, &url, &body);
    guard.lock().capture = Some(replacement.unwrap_or(body));
}

fn resolve_url(effective_url: &str, fallback: &Url) -> Url {
    Url::parse(effective_url).unwrap_or_else(|_| fallback.clone())
}
