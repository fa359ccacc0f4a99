use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

/// Server configuration. Every flag can also come from the environment
/// (or a `.env` file, loaded by `main` before parsing).
#[derive(Parser, Clone)]
#[command(name = "element-editor", about = "AI-assisted HTML element editing backend")]
pub struct Config {
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "SERVER_PORT", default_value_t = 3001)]
    pub port: u16,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// Enables the `search_image` tool when set.
    #[arg(long, env = "UNSPLASH_ACCESS_KEY", hide_env_values = true)]
    pub unsplash_access_key: Option<String>,

    #[arg(long, env = "UNSPLASH_BASE_URL", default_value = "https://api.unsplash.com")]
    pub unsplash_base_url: String,

    /// Upper bound for each outbound HTTP call, in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Resolves `host` (an IP literal or a name such as `localhost`) to the
    /// first matching socket address.
    pub async fn bind_addr(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("could not resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("{}:{} resolved to no address", self.host, self.port))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field(
                "unsplash_access_key",
                &self.unsplash_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("unsplash_base_url", &self.unsplash_base_url)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .finish()
    }
}
