use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

const ENV_BIND_TO: &str = "GATEWAY_BIND_TO";
const ENV_UPSTREAM_HOST: &str = "GATEWAY_UPSTREAM_HOST";
const ENV_UPSTREAM_PORT: &str = "GATEWAY_UPSTREAM_PORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub bind_to: String,
    pub upstream_host: String,
    pub upstream_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            bind_to: "127.0.0.1:5000".to_string(),
            upstream_host: "web".to_string(),
            upstream_port: 8001,
        }
    }
}

impl RuntimeConfig {
    /// Builds the config from the command line (`gateway [runtime_config.yaml]`)
    /// then applies the `GATEWAY_*` environment overrides.
    pub fn load<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args.next().unwrap_or_else(|| "api-gateway".to_string());
        let rest: Vec<String> = args.collect();

        let mut runtime_config = match rest.as_slice() {
            [] => RuntimeConfig::default(),
            [path] => RuntimeConfig::from_path(path)?,
            _ => bail!("usage: {program} [runtime_config.yaml]"),
        };

        runtime_config.apply_env(std::env::vars())?;
        Ok(runtime_config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let reader = BufReader::new(file);
        let runtime_config = serde_yaml::from_reader(reader)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(runtime_config)
    }

    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_BIND_TO => self.bind_to = value,
                ENV_UPSTREAM_HOST => self.upstream_host = value,
                ENV_UPSTREAM_PORT => {
                    self.upstream_port = value
                        .parse()
                        .map_err(|err| anyhow!("{ENV_UPSTREAM_PORT}='{value}': {err}"))?
                }
                _ => (),
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_to
            .parse()
            .map_err(|err| anyhow!("Address bind_to '{}' is not valid: {err}", self.bind_to))
    }

    pub fn upstream_authority(&self) -> String {
        format!("{}:{}", self.upstream_host, self.upstream_port)
    }
}
