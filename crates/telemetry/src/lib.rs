//! telemetry - 可观测性库

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid metrics address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to install Prometheus recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// 默认过滤规则：sqlx 每条语句都会打 info 日志，压到 warn
fn default_directives(log_level: &str) -> String {
    format!("{},sqlx=warn", log_level)
}

/// `RUST_LOG` 优先，否则使用配置的级别
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)))
}

/// 初始化 tracing（文本格式）
pub fn init_tracing(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt::layer().json().with_current_span(false))
        .try_init()?;
    Ok(())
}

/// 初始化 Prometheus metrics，并在 `addr` 上暴露 `/metrics`
///
/// 需要在 tokio 运行时内调用。
pub fn init_metrics(addr: &str) -> Result<SocketAddr, TelemetryError> {
    let socket: SocketAddr = parse_metrics_addr(addr)?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()?;

    Ok(socket)
}

fn parse_metrics_addr(addr: &str) -> Result<SocketAddr, TelemetryError> {
    addr.parse()
        .map_err(|_| TelemetryError::InvalidAddress(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metrics_addr() {
        let addr = parse_metrics_addr("127.0.0.1:9100").unwrap();
        assert_eq!(addr.port(), 9100);
    }

    #[test]
    fn test_default_directives_quiet_sqlx() {
        assert_eq!(default_directives("debug"), "debug,sqlx=warn");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_tracing("info");
        let err = init_tracing_json("info").unwrap_err();
        assert!(matches!(err, TelemetryError::Subscriber(_)));
    }

    #[test]
    fn test_parse_metrics_addr_rejects_garbage() {
        let err = parse_metrics_addr("not-an-addr").unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidAddress(_)));
    }
}
