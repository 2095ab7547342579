use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{
    HeaderName, ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, HOST, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE,
};
use hyper::{HeaderMap, Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Headers describing the inbound connection or body rather than the request.
/// Response headers are not relayed, so the upstream body must come back unencoded.
static SKIPPED_HEADERS: [HeaderName; 8] = [
    HOST,
    CONTENT_LENGTH,
    ACCEPT_ENCODING,
    CONNECTION,
    TRANSFER_ENCODING,
    TE,
    TRAILER,
    UPGRADE,
];
static SKIPPED_NON_STANDARD: [&str; 2] = ["keep-alive", "proxy-connection"];

pub fn is_forwarded(name: &HeaderName) -> bool {
    !SKIPPED_HEADERS.contains(name) && !SKIPPED_NON_STANDARD.contains(&name.as_str())
}

/// The single service every forwarded route talks to.
#[derive(Clone)]
pub struct Upstream {
    base: String,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl Upstream {
    pub fn new(authority: &str) -> Self {
        Upstream {
            base: format!("http://{authority}"),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn uri_for(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Sends `GET <path>` with a copy of `headers` and reads the whole answer.
    pub async fn get(&self, path: &str, headers: &HeaderMap) -> Result<(StatusCode, Bytes)> {
        let mut req = Request::builder()
            .method(Method::GET)
            .uri(self.uri_for(path))
            .body(Empty::new())?;

        let forwarded = req.headers_mut();
        for (name, value) in headers.iter().filter(|(name, _)| is_forwarded(name)) {
            forwarded.append(name.clone(), value.clone());
        }

        let response = self
            .client
            .request(req)
            .await
            .map_err(|err| anyhow!("Upstream request failed: {err:?}"))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|err| anyhow!("Upstream body read failed: {err}"))?
            .to_bytes();

        Ok((status, body))
    }
}
