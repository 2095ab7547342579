use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::route::{Route, RouteMatch, UpstreamPolicy, ROUTE_TABLE};
use crate::runtime_config::RuntimeConfig;
use crate::upstream::Upstream;

static NOT_FOUND: &[u8] = b"Not Found";
static METHOD_NOT_ALLOWED: &[u8] = b"Method Not Allowed";
static BAD_GATEWAY: &[u8] = b"Bad Gateway";

const TEXT_HTML: &str = "text/html; charset=utf-8";

fn get_response(status_code: StatusCode, content: Bytes) -> Result<Response<Full<Bytes>>> {
    let response = Response::builder()
        .status(status_code)
        .header(CONTENT_TYPE, TEXT_HTML)
        .body(Full::new(content))?;
    Ok(response)
}

pub struct Gateway {
    upstream: Upstream,
}

impl Gateway {
    pub fn new(runtime_config: &RuntimeConfig) -> Self {
        Gateway {
            upstream: Upstream::new(&runtime_config.upstream_authority()),
        }
    }

    pub async fn response(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
        let (parts, _body) = req.into_parts();
        let method = &parts.method;
        let path = parts.uri.path();

        match ROUTE_TABLE.match_path(path, method) {
            RouteMatch::NotFound => {
                debug!("method='{}' path='{}' status_code='404'", method, path);
                get_response(StatusCode::NOT_FOUND, Bytes::from_static(NOT_FOUND))
            }
            RouteMatch::MethodNotAllowed => {
                debug!("method='{}' path='{}' status_code='405'", method, path);
                let mut response = get_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    Bytes::from_static(METHOD_NOT_ALLOWED),
                )?;
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET"));
                Ok(response)
            }
            RouteMatch::Found(Route::Literal(content)) => {
                debug!("method='{}' path='{}' status_code='200'", method, path);
                get_response(StatusCode::OK, Bytes::from_static(*content))
            }
            RouteMatch::Found(Route::Forward {
                upstream_path,
                policy,
            }) => self.forward(&parts, upstream_path, *policy).await,
        }
    }

    async fn forward(
        &self,
        parts: &Parts,
        upstream_path: &str,
        policy: UpstreamPolicy,
    ) -> Result<Response<Full<Bytes>>> {
        let method = &parts.method;
        let path = parts.uri.path();
        let uri = self.upstream.uri_for(upstream_path);

        let start_time = Instant::now();
        let result = self.upstream.get(upstream_path, &parts.headers).await;
        let duration_ms = start_time.elapsed().as_millis();

        match result {
            Ok((upstream_status, body)) => {
                let (status_code, content) = policy.apply(upstream_status, body);
                info!(
                    "method='{}' path='{}' uri='{}' upstream_status_code='{}' status_code='{}' duration='{}ms'",
                    method,
                    path,
                    uri,
                    upstream_status.as_u16(),
                    status_code.as_u16(),
                    duration_ms,
                );
                get_response(status_code, content)
            }
            Err(error) => {
                warn!(
                    "method='{}' path='{}' uri='{}' status_code='502' error='{:?}' duration='{}ms'",
                    method, path, uri, error, duration_ms,
                );
                get_response(StatusCode::BAD_GATEWAY, Bytes::from_static(BAD_GATEWAY))
            }
        }
    }
}

/// Accepts connections forever, one task per connection.
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>) -> Result<()> {
    let service = service_fn(move |req| {
        let gateway = gateway.clone();
        async move { gateway.response(req).await }
    });

    loop {
        let stream = match listener.accept().await {
            Ok((stream, _socket)) => stream,
            Err(err) => {
                error!("Failed to accept connection: {err:?}");
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                error!("Failed to serve connection: {err:?}");
            }
        });
    }
}
