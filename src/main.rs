use std::env;
use std::process::exit;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::net::TcpListener;

use api_gateway::{serve, Gateway, RuntimeConfig};

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let runtime_config = match RuntimeConfig::load(env::args()) {
        Ok(runtime_config) => runtime_config,
        Err(e) => {
            error!("event='Runtime config is not valid: {e:#}'");
            exit(1);
        }
    };

    let addr = match runtime_config.bind_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("event='{e}'");
            exit(1);
        }
    };

    let gateway = Arc::new(Gateway::new(&runtime_config));

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| anyhow!("Could not listen on {addr}: {err}"))?;

    info!(
        "event='Listening on http://{}' upstream='{}'",
        addr,
        runtime_config.upstream_authority()
    );

    serve(listener, gateway).await
}
