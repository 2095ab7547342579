//! Mock upstream and gateway harness shared by the integration tests.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;

use api_gateway::{serve, Gateway, RuntimeConfig};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

/// Upstream answering each path with a programmable status and body.
#[derive(Default)]
pub struct MockUpstream {
    responses: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    gzip_responses: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockUpstream {
    pub fn respond(&self, path: &str, status: StatusCode, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.into()));
    }

    /// Serves `gzipped` with `Content-Encoding: gzip` on `path` whenever the
    /// request accepts gzip.
    pub fn respond_gzip_when_accepted(&self, path: &str, gzipped: impl Into<Bytes>) {
        self.gzip_responses
            .lock()
            .unwrap()
            .insert(path.to_string(), gzipped.into());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, req: &Request<Incoming>) -> Response<Full<Bytes>> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            headers: req.headers().clone(),
        });

        let accepts_gzip = req
            .headers()
            .get_all(ACCEPT_ENCODING)
            .iter()
            .any(|value| value.to_str().unwrap_or_default().contains("gzip"));
        if accepts_gzip {
            if let Some(gzipped) = self.gzip_responses.lock().unwrap().get(req.uri().path()) {
                let mut response = Response::new(Full::new(gzipped.clone()));
                response
                    .headers_mut()
                    .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                return response;
            }
        }

        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .get(req.uri().path())
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, Bytes::from_static(b"no such path")));

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        response
    }
}

pub async fn start_mock_upstream() -> (SocketAddr, Arc<MockUpstream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let upstream = Arc::new(MockUpstream::default());

    let shared = upstream.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let upstream = shared.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let response = upstream.answer(&req);
                    async move { Ok::<_, Infallible>(response) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (addr, upstream)
}

pub async fn start_gateway(upstream_addr: SocketAddr) -> SocketAddr {
    let runtime_config = RuntimeConfig {
        bind_to: "127.0.0.1:0".to_string(),
        upstream_host: upstream_addr.ip().to_string(),
        upstream_port: upstream_addr.port(),
    };

    let listener = TcpListener::bind(runtime_config.bind_addr().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = Arc::new(Gateway::new(&runtime_config));

    tokio::spawn(serve(listener, gateway));

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct TestClient {
    gateway: SocketAddr,
    client: Client<HttpConnector, Empty<Bytes>>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestClient {
    pub fn new(gateway: SocketAddr) -> Self {
        TestClient {
            gateway,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, &[]).await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.gateway, path));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = self
            .client
            .request(builder.body(Empty::new()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
