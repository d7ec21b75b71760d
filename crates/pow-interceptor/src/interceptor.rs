//! Request pipeline: classify, validate, decode, compute, respond.
//!
//! Every request ends in exactly one of three ways: forwarded to the node
//! with its original bytes, rejected with a status and reason, or answered
//! with a locally computed `attachToTangle` response.

use std::{
    error::Error,
    net::SocketAddr,
    time::Instant,
};

use http_body_util::{
    BodyExt,
    Full,
};
use hyper::{
    Method,
    Request,
    Response,
    body::{
        Body,
        Bytes,
    },
    header::{
        ACCESS_CONTROL_ALLOW_ORIGIN,
        CONTENT_TYPE,
        HeaderValue,
    },
    http::request::Parts,
};
use metrics::counter;
use tracing::{
    debug,
    info,
    warn,
};
use uuid::Uuid;

use crate::{
    bundle::inspect_bundle,
    command::{
        AttachToTangleResponse,
        Classification,
        ForwardReason,
        classify,
    },
    config::Limits,
    error::{
        InterceptError,
        Result,
    },
    executor::ComputeExecutor,
    upstream::{
        ForwardBody,
        SharedUpstream,
    },
    validation::{
        Admission,
        validate,
    },
};

#[derive(Clone)]
pub struct Interceptor {
    limits: Limits,
    executor: ComputeExecutor,
    upstream: SharedUpstream,
}

impl Interceptor {
    pub fn new(limits: Limits, executor: ComputeExecutor, upstream: SharedUpstream) -> Self {
        Self {
            limits,
            executor,
            upstream,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Handles one inbound request and always produces a response.
    #[tracing::instrument(
        level = "info",
        name = "interceptor::handle",
        skip_all,
        fields(request_id, client_addr = %client_addr)
    )]
    pub async fn handle<B>(&self, request: Request<B>, client_addr: SocketAddr) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Error + Send + Sync + 'static,
        Bytes: From<B::Data>,
    {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(&request_id));

        match self.process(request, client_addr).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, status = %err.status(), "rejecting request");
                counter!("pow_interceptor_rejections_total", "reason" => err.kind()).increment(1);
                error_response(&err)
            }
        }
    }

    async fn process<B>(
        &self,
        request: Request<B>,
        client_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Error + Send + Sync + 'static,
        Bytes: From<B::Data>,
    {
        let (parts, body) = request.into_parts();

        // Only POST bodies are inspected. Anything else streams to the node unread.
        if parts.method != Method::POST {
            let body = if body.is_end_stream() {
                ForwardBody::from(Bytes::new())
            } else {
                ForwardBody::wrap_stream(body.into_data_stream())
            };
            return self.forward(parts, body, ForwardReason::NotWrite).await;
        }

        // The body can only be read once; keep the bytes for a passthrough.
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!(%err, "failed to read request body");
                return Err(InterceptError::MissingBody);
            }
        };

        let request = match classify(&parts.method, &body) {
            Classification::Forward(reason) => {
                return self.forward(parts, body.into(), reason).await;
            }
            Classification::Intercept(request) => request,
        };

        info!("new attachToTangle request from {client_addr}");
        let mwm = match validate(&request, &self.limits)? {
            Admission::Compute { mwm } => mwm,
            Admission::Passthrough => {
                return self.forward(parts, body.into(), ForwardReason::EmptyBundle).await;
            }
        };

        let started = Instant::now();
        inspect_bundle(&request.trytes).map_err(|err| {
            warn!(%err, "rejecting bundle");
            InterceptError::MalformedTransaction(err)
        })?;

        let trytes = self.executor.execute(&request, mwm).await?;

        let response = AttachToTangleResponse {
            trytes,
            duration: started.elapsed().as_millis() as u64,
        };
        counter!("pow_interceptor_requests_total", "outcome" => "attached").increment(1);
        encode_response(&response)
    }

    async fn forward(
        &self,
        parts: Parts,
        body: ForwardBody,
        reason: ForwardReason,
    ) -> Result<Response<Full<Bytes>>> {
        debug!(%reason, method = %parts.method, uri = %parts.uri, "forwarding request to node");
        counter!("pow_interceptor_forward_total", "reason" => reason.as_str()).increment(1);

        let response = self
            .upstream
            .forward(Request::from_parts(parts, body))
            .await?;
        Ok(response.map(Full::new))
    }
}

/// Serializes a successful `attachToTangle` reply the way the node does.
pub fn encode_response(response: &AttachToTangleResponse) -> Result<Response<Full<Bytes>>> {
    let body = serde_json::to_vec(response)?;

    let mut response = Response::new(Full::new(Bytes::from(body)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}

/// Plain text error reply carrying the mapped status and the reason.
pub fn error_response(err: &InterceptError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(err.to_string())));
    *response.status_mut() = err.status();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
