use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Master's public TCP listen address.
    pub host: String,
    pub port: u16,
    pub workers_count: usize,
    /// Path template for each worker's local Unix-domain socket;
    /// `{port}` and `{i}` are substituted.
    pub worker_socket_template: String,
    /// Worker `i` publishes its Receipt Bus on `base + i`; every worker
    /// subscribes to all of `[base, base + workers_count)`.
    pub incoming_messages_queue_base_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub log_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            log_path: "deliver_messages.log".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Account {
    pub system_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 2775)?
            .set_default("server.workers_count", 2)?
            .set_default(
                "server.worker_socket_template",
                "/tmp/smpp_gateway_{port}_worker_{i}.sock",
            )?
            .set_default("server.incoming_messages_queue_base_port", 25555)?
            .set_default("log.level", "info")?
            .set_default("provider.log_path", "deliver_messages.log")?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name(&format!("config.{run_mode}")).required(false))
            .add_source(Environment::with_prefix("SMPP").separator("__"))
            .set_override_option("server.host", env::var("SERVER_HOST").ok())?
            .set_override_option(
                "server.port",
                env::var("SERVER_PORT").ok().map(|v| v.parse::<u16>().unwrap_or(2775)),
            )?
            .set_override_option(
                "server.workers_count",
                env::var("WORKERS_COUNT").ok().map(|v| v.parse::<usize>().unwrap_or(2)),
            )?
            .set_override_option(
                "server.worker_socket_template",
                env::var("WORKER_SOCKET_TEMPLATE").ok(),
            )?
            .set_override_option(
                "server.incoming_messages_queue_base_port",
                env::var("INCOMING_MESSAGES_QUEUE_BASE_PORT")
                    .ok()
                    .map(|v| v.parse::<u16>().unwrap_or(25555)),
            )?
            .set_override_option("log.level", env::var("LOG_LEVEL").ok())?
            .set_override_option("provider.log_path", env::var("PROVIDER_LOG_PATH").ok())?
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_socket_template_substitutes_port_and_index() {
        let template = "/tmp/smpp_gateway_{port}_worker_{i}.sock";
        let resolved = template.replace("{port}", "2775").replace("{i}", "3");
        assert_eq!(resolved, "/tmp/smpp_gateway_2775_worker_3.sock");
    }
}
