use std::sync::Arc;

use host::{
    config::{read_env_optional_string, read_env_string, read_env_usize},
    Arcade, HostConfig,
};

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub(crate) const DEFAULT_MAX_TAPE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub(crate) bind_addr: String,
    pub(crate) max_tape_bytes: usize,
    pub(crate) json_limit: usize,
    /// Required on the routes that sign with the wallet, when set.
    pub(crate) api_key: Option<String>,
    pub(crate) host: HostConfig,
}

impl ServerConfig {
    pub(crate) fn from_env() -> Self {
        let max_tape_bytes = read_env_usize("MAX_TAPE_BYTES", DEFAULT_MAX_TAPE_BYTES);
        // base64 inflates tape and outcard by a third, plus the JSON envelope
        let json_limit = read_env_usize("JSON_LIMIT_BYTES", max_tape_bytes.saturating_mul(4));

        Self {
            bind_addr: read_env_string("API_BIND_ADDR", DEFAULT_BIND_ADDR),
            max_tape_bytes,
            json_limit,
            api_key: read_env_optional_string("API_KEY"),
            host: HostConfig::from_env(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) arcade: Arc<Arcade>,
    pub(crate) max_tape_bytes: usize,
    pub(crate) api_key: Option<String>,
}

impl AppState {
    pub(crate) fn new(config: &ServerConfig) -> Self {
        Self {
            arcade: Arc::new(Arcade::from_config(config.host.clone())),
            max_tape_bytes: config.max_tape_bytes,
            api_key: config.api_key.clone(),
        }
    }
}
