use std::collections::HashMap;

use bytes::Bytes;
use hyper::{Method, StatusCode};
use once_cell::sync::Lazy;

pub static HELLO_WORLD: &[u8] = b"Hello, World!";
pub static ACCESS_FORBIDDEN: &[u8] = b"Access to the Web service is forbidden.\n";

pub static ROUTE_TABLE: Lazy<RouteTable> = Lazy::new(|| {
    RouteTable::new([
        ("/", Route::Literal(HELLO_WORLD)),
        ("/hello", Route::forward("/hello", UpstreamPolicy::ForbidOnError)),
        (
            "/the/good/path",
            Route::forward("/the/good/path", UpstreamPolicy::ForbidOnError),
        ),
        (
            "/the/bad/path",
            Route::forward("/the/bad/path", UpstreamPolicy::Passthrough),
        ),
    ])
});

/// What to send back once the upstream has answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamPolicy {
    /// Relay a 200 as is, replace the body of anything else.
    ForbidOnError,
    /// Relay body and status whatever the status is.
    Passthrough,
}

impl UpstreamPolicy {
    pub fn apply(self, status: StatusCode, body: Bytes) -> (StatusCode, Bytes) {
        match self {
            UpstreamPolicy::ForbidOnError if status != StatusCode::OK => {
                (status, Bytes::from_static(ACCESS_FORBIDDEN))
            }
            _ => (status, body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Literal(&'static [u8]),
    Forward {
        upstream_path: &'static str,
        policy: UpstreamPolicy,
    },
}

impl Route {
    fn forward(upstream_path: &'static str, policy: UpstreamPolicy) -> Self {
        Route::Forward {
            upstream_path,
            policy,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    Found(&'a Route),
    MethodNotAllowed,
    NotFound,
}

#[derive(Debug)]
pub struct RouteTable {
    routes: HashMap<&'static str, Route>,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = (&'static str, Route)>) -> Self {
        RouteTable {
            routes: routes.into_iter().collect(),
        }
    }

    /// Every route only answers GET.
    pub fn match_path(&self, path: &str, method: &Method) -> RouteMatch<'_> {
        match self.routes.get(path) {
            None => RouteMatch::NotFound,
            Some(_) if method != Method::GET => RouteMatch::MethodNotAllowed,
            Some(route) => RouteMatch::Found(route),
        }
    }
}
