use common::{env_opt, env_or};
use inference::InferenceConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub use common::Environment;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
    pub inference: InferenceConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let host: IpAddr = match env_opt("HOST") {
            Some(host) => host
                .parse()
                .map_err(|e| anyhow::anyhow!("HOST `{}` is not an IP address: {}", host, e))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = env_or("PORT", DEFAULT_PORT);

        let max_upload_bytes = env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        let otel_endpoint = env_opt("OTEL_EXPORTER_OTLP_ENDPOINT");

        let inference = InferenceConfig::from_env()?;

        Ok(Self {
            environment,
            bind_addr: SocketAddr::new(host, port),
            max_upload_bytes,
            otel_endpoint,
            inference,
        })
    }
}
