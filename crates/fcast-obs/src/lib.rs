use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,fcast=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Cloud Logging friendly JSON lines
    #[default]
    Json,
    Plain,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" | "text" => Ok(LogFormat::Plain),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Initialize logging.
/// - RUST_LOG respected; default to "info,fcast=debug"
/// - JSON or plain fmt output
pub fn init(service_name: &str, format: LogFormat) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let registry = tracing_subscriber::registry().with(EnvFilter::new(env_filter));

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(service = %service_name, ?format, "Logging initialized");
}
