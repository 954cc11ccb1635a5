//! Request logging layer

use http::{Request, Response, StatusCode};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnFailure, OnRequest, OnResponse, TraceLayer,
};
use tracing::{info_span, Level, Span};

pub type LoggingLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    LogRequest,
    LogResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    LogFailure,
>;

/// Logs one span per request. A 503 means a dependency is down, which is
/// an expected operating condition, so it is logged at warn rather than
/// error level.
pub fn logging_layer() -> LoggingLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(LogRequest)
        .on_response(LogResponse)
        .on_failure(LogFailure)
}

/// Level a completed response is logged at.
pub fn response_level(status: StatusCode) -> Level {
    if status == StatusCode::SERVICE_UNAVAILABLE || status.is_client_error() {
        Level::WARN
    } else if status.is_server_error() {
        Level::ERROR
    } else {
        Level::INFO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "health_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogRequest;

impl<B> OnRequest<B> for LogRequest {
    fn on_request(&mut self, request: &Request<B>, _span: &Span) {
        tracing::debug!("started {} {}", request.method(), request.uri().path());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogResponse;

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis();

        let level = response_level(status);
        if level == Level::ERROR {
            tracing::error!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "server error response"
            );
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "dependency unavailable"
            );
        } else if level == Level::WARN {
            tracing::warn!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "client error response"
            );
        } else {
            tracing::info!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "request completed"
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogFailure;

impl OnFailure<ServerErrorsFailureClass> for LogFailure {
    fn on_failure(&mut self, error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        if matches!(error, ServerErrorsFailureClass::StatusCode(code) if code == StatusCode::SERVICE_UNAVAILABLE)
        {
            return;
        }
        tracing::error!(
            latency_ms = latency.as_millis(),
            error = %error,
            "request failed"
        );
    }
}
