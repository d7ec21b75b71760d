//! Passthrough transport to the node API.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{
    HeaderMap,
    Request,
    Response,
    Uri,
    body::Bytes,
    header::{
        CONNECTION,
        CONTENT_LENGTH,
        HOST,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    },
};
use reqwest::{
    Client,
    redirect,
};
use url::Url;

use crate::error::{
    InterceptError,
    Result,
};

/// Request body handed to an [`Upstream`]: buffered bytes for inspected
/// requests, the caller's stream for everything else.
pub type ForwardBody = reqwest::Body;

/// Receives every request the interceptor does not handle itself.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forwards `request` as is and returns the node's response.
    async fn forward(&self, request: Request<ForwardBody>) -> Result<Response<Bytes>>;
}

pub type SharedUpstream = Arc<dyn Upstream>;

/// Forwards over HTTP to a fixed base URL.
#[derive(Clone, Debug)]
pub struct HttpUpstream {
    base: Url,
    http: Client,
}

impl HttpUpstream {
    pub fn new(base: Url) -> Result<Self> {
        if !matches!(base.scheme(), "http" | "https") {
            return Err(InterceptError::InvalidConfig(format!(
                "upstream must be an http or https url, got {base}"
            )));
        }
        // 3xx responses are relayed to the caller as is.
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|err| InterceptError::InvalidConfig(err.to_string()))?;
        Ok(Self { base, http })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Joins the request path and query onto the base URL.
    fn target(&self, uri: &Uri) -> Url {
        let mut url = self.base.clone();
        let base_path = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{base_path}{}", uri.path()));
        url.set_query(uri.query());
        url
    }
}

/// Removes headers that only apply to a single connection.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: Request<ForwardBody>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let url = self.target(&parts.uri);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        let upstream = self
            .http
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_LENGTH);
        let body = upstream.bytes().await?;

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
